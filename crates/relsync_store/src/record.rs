//! Record snapshots, write batches and change sets.

use crate::id::ObjectId;
use crate::value::LocalValue;
use std::collections::BTreeMap;

/// A snapshot of one object in the local store.
///
/// Missing properties read as [`LocalValue::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: ObjectId,
    entity: String,
    values: BTreeMap<String, LocalValue>,
}

impl Record {
    /// Creates an empty record with a fresh object ID.
    pub fn new(entity: impl Into<String>) -> Self {
        Self::with_id(ObjectId::new(), entity)
    }

    /// Creates an empty record with the given object ID.
    pub fn with_id(id: ObjectId, entity: impl Into<String>) -> Self {
        Self {
            id,
            entity: entity.into(),
            values: BTreeMap::new(),
        }
    }

    /// Returns the object ID.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns the entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns the value of a property.
    pub fn get(&self, property: &str) -> &LocalValue {
        self.values.get(property).unwrap_or(&LocalValue::Null)
    }

    /// Returns a string property, if set.
    pub fn get_str(&self, property: &str) -> Option<&str> {
        self.get(property).as_str()
    }

    /// Sets the value of a property. Setting null removes it.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<LocalValue>) {
        let value = value.into();
        let property = property.into();
        if value.is_null() {
            self.values.remove(&property);
        } else {
            self.values.insert(property, value);
        }
    }

    /// Builder-style [`Record::set`].
    pub fn with(mut self, property: impl Into<String>, value: impl Into<LocalValue>) -> Self {
        self.set(property, value);
        self
    }

    /// Iterates over the non-null values.
    pub fn values(&self) -> impl Iterator<Item = (&str, &LocalValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A set of changes to commit atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    /// Author tag carried to the resulting [`ChangeSet`].
    pub author: Option<String>,
    /// New objects.
    pub inserts: Vec<Record>,
    /// Full replacements of existing objects.
    pub updates: Vec<Record>,
    /// Objects to delete.
    pub deletes: Vec<ObjectId>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the author tag.
    pub fn authored_by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Adds an insert.
    pub fn insert(mut self, record: Record) -> Self {
        self.inserts.push(record);
        self
    }

    /// Adds an update.
    pub fn update(mut self, record: Record) -> Self {
        self.updates.push(record);
        self
    }

    /// Adds a delete.
    pub fn delete(mut self, id: ObjectId) -> Self {
        self.deletes.push(id);
        self
    }

    /// Returns true if the batch has no changes.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// The committed changes of one write batch.
///
/// Deleted entries carry the last committed snapshot of the object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Commit sequence number.
    pub sequence: u64,
    /// Author of the batch, if any.
    pub author: Option<String>,
    /// Inserted objects.
    pub inserted: Vec<Record>,
    /// Updated objects.
    pub updated: Vec<Record>,
    /// Deleted objects.
    pub deleted: Vec<Record>,
}

/// Changes of one entity within a [`ChangeSet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityChanges {
    /// Inserted objects.
    pub inserted: Vec<Record>,
    /// Updated objects.
    pub updated: Vec<Record>,
    /// Deleted objects.
    pub deleted: Vec<Record>,
}

impl ChangeSet {
    /// Returns true if this change set was produced by the given author.
    pub fn is_authored_by(&self, author: &str) -> bool {
        self.author.as_deref() == Some(author)
    }

    /// Total number of changed objects.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Groups the changes by entity name.
    pub fn partition_by_entity(&self) -> BTreeMap<String, EntityChanges> {
        let mut grouped: BTreeMap<String, EntityChanges> = BTreeMap::new();
        for record in &self.inserted {
            grouped
                .entry(record.entity().to_string())
                .or_default()
                .inserted
                .push(record.clone());
        }
        for record in &self.updated {
            grouped
                .entry(record.entity().to_string())
                .or_default()
                .updated
                .push(record.clone());
        }
        for record in &self.deleted {
            grouped
                .entry(record.entity().to_string())
                .or_default()
                .deleted
                .push(record.clone());
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_values_are_removed() {
        let mut record = Record::new("Task").with("title", "a");
        assert_eq!(record.get_str("title"), Some("a"));
        record.set("title", LocalValue::Null);
        assert!(record.get("title").is_null());
        assert_eq!(record.values().count(), 0);
    }

    #[test]
    fn partition_groups_by_entity() {
        let changes = ChangeSet {
            sequence: 1,
            author: None,
            inserted: vec![Record::new("Task"), Record::new("Project")],
            updated: vec![Record::new("Task")],
            deleted: vec![Record::new("Project")],
        };

        let grouped = changes.partition_by_entity();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["Task"].inserted.len(), 1);
        assert_eq!(grouped["Task"].updated.len(), 1);
        assert_eq!(grouped["Project"].deleted.len(), 1);
        assert_eq!(changes.len(), 4);
    }

    #[test]
    fn author_check() {
        let changes = ChangeSet {
            author: Some("sync".into()),
            ..ChangeSet::default()
        };
        assert!(changes.is_authored_by("sync"));
        assert!(!changes.is_authored_by("app"));
        assert!(!ChangeSet::default().is_authored_by("sync"));
    }
}
