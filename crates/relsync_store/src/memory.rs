//! In-memory local store.

use crate::change_feed::{ChangeFeed, ChangeObserver, ObserverToken};
use crate::error::{StoreError, StoreResult};
use crate::id::ObjectId;
use crate::record::{ChangeSet, Record, WriteBatch};
use crate::schema::{PropertyDescription, Schema};
use crate::store::LocalStore;
use crate::value::LocalValue;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A thread-safe in-memory [`LocalStore`].
///
/// Every commit is validated against the schema and applied atomically:
/// either the whole batch is stored or nothing is.
pub struct MemoryStore {
    schema: Schema,
    objects: RwLock<BTreeMap<ObjectId, Record>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    /// Creates an empty store for the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            objects: RwLock::new(BTreeMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    /// Returns all objects of an entity.
    pub fn all(&self, entity: &str) -> Vec<Record> {
        self.objects
            .read()
            .values()
            .filter(|record| record.entity() == entity)
            .cloned()
            .collect()
    }

    /// Returns the number of objects of an entity.
    pub fn count(&self, entity: &str) -> usize {
        self.objects
            .read()
            .values()
            .filter(|record| record.entity() == entity)
            .count()
    }

    /// Returns the latest commit sequence number.
    pub fn latest_sequence(&self) -> u64 {
        self.feed.latest_sequence()
    }

    fn check_record(&self, record: &Record) -> StoreResult<()> {
        let entity = self.entity(record.entity())?;

        for (name, value) in record.values() {
            let property = entity
                .property(name)
                .ok_or_else(|| StoreError::unknown_property(entity.name(), name))?;
            let conforms = match property {
                PropertyDescription::Attribute(attr) => value.conforms_to(attr.attribute_type),
                PropertyDescription::Relationship(rel) if rel.to_many => {
                    matches!(value, LocalValue::ToMany(_))
                }
                PropertyDescription::Relationship(_) => matches!(value, LocalValue::ToOne(_)),
            };
            if !conforms {
                return Err(StoreError::TypeMismatch {
                    entity: entity.name().to_string(),
                    property: name.to_string(),
                    expected: match property {
                        PropertyDescription::Attribute(attr) => Some(attr.attribute_type),
                        PropertyDescription::Relationship(_) => None,
                    },
                });
            }
        }

        for (name, property) in entity.properties() {
            if !property.is_persisted() || property.is_optional() {
                continue;
            }
            let present = match record.get(name) {
                LocalValue::Null => false,
                LocalValue::ToMany(ids) => !ids.is_empty(),
                _ => true,
            };
            if !present {
                return Err(StoreError::missing_required(entity.name(), name));
            }
        }

        Ok(())
    }
}

impl LocalStore for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn fetch(&self, id: ObjectId) -> StoreResult<Option<Record>> {
        Ok(self.objects.read().get(&id).cloned())
    }

    fn fetch_by_attribute(
        &self,
        entity: &str,
        attribute: &str,
        value: &LocalValue,
    ) -> StoreResult<Option<Record>> {
        self.entity(entity)?;
        Ok(self
            .objects
            .read()
            .values()
            .find(|record| record.entity() == entity && record.get(attribute) == value)
            .cloned())
    }

    fn validate(&self, record: &Record) -> StoreResult<()> {
        self.check_record(record)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<ChangeSet> {
        for record in batch.inserts.iter().chain(batch.updates.iter()) {
            self.check_record(record)?;
        }

        let changes = {
            let mut objects = self.objects.write();

            for record in &batch.inserts {
                if objects.contains_key(&record.id()) {
                    return Err(StoreError::AlreadyExists { id: record.id() });
                }
            }
            for id in batch.updates.iter().map(Record::id).chain(batch.deletes.iter().copied()) {
                if !objects.contains_key(&id) {
                    return Err(StoreError::NotFound { id });
                }
            }

            let mut deleted = Vec::with_capacity(batch.deletes.len());
            for id in &batch.deletes {
                if let Some(record) = objects.remove(id) {
                    deleted.push(record);
                }
            }
            for record in batch.inserts.iter().chain(batch.updates.iter()) {
                objects.insert(record.id(), record.clone());
            }

            ChangeSet {
                sequence: self.feed.next_sequence(),
                author: batch.author,
                inserted: batch.inserts,
                updated: batch.updates,
                deleted,
            }
        };

        tracing::trace!(
            sequence = changes.sequence,
            changed = changes.len(),
            "memory store commit"
        );
        self.feed.emit(&changes);
        Ok(changes)
    }

    fn add_observer(&self, observer: ChangeObserver) -> ObserverToken {
        self.feed.add_observer(observer)
    }

    fn remove_observer(&self, token: ObserverToken) {
        self.feed.remove_observer(token);
    }
}
