//! Translation between local records and remote payloads.
//!
//! Local values map to the remote data model as follows:
//!
//! | Local                 | Remote                                   |
//! |-----------------------|------------------------------------------|
//! | string, bool, numbers | the same scalar                          |
//! | date                  | integer milliseconds since the epoch     |
//! | sub-millisecond date  | RFC 3339 text with nanoseconds           |
//! | binary                | standard base64 text                     |
//! | to-one relationship   | the target's sync ID, or null            |
//! | to-many relationship  | array of target sync IDs, or null        |
//!
//! Unordered to-many relationships are written sorted so that equal sets
//! always produce equal payloads.
//!
//! Relationship targets that are not known locally become placeholder
//! records. A target whose placeholder would not pass validation is left out
//! and reported as an [`UnresolvedReference`] instead.

use crate::config::{SyncAttributes, SyncConfig};
use crate::delegate::SyncDelegate;
use crate::error::{ExpectedValue, SyncResult, TypeMismatch};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use relsync_remote::{RemotePayload, Value};
use relsync_store::{
    AttributeType, EntityDescription, LocalStore, LocalValue, ObjectId, PropertyDescription,
    Record, RelationshipDescription,
};
use std::collections::BTreeMap;

/// Result of applying a remote payload to a record.
#[derive(Debug, Default)]
pub struct AppliedChanges {
    /// Placeholder records created for relationship targets not yet known
    /// locally. They must be inserted together with the record.
    pub related: Vec<Record>,
    /// Remote fields that were skipped because of their type.
    pub mismatches: Vec<TypeMismatch>,
    /// Relationships missing targets that could not be created yet.
    pub unresolved: Vec<UnresolvedReference>,
}

/// A relationship whose targets are only partly present locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Relationship on the applied record.
    pub relationship: String,
    /// Entity of the targets.
    pub destination: String,
    /// Whether the relationship is to-many.
    pub to_many: bool,
    /// Every target sync ID, in remote order.
    pub sync_ids: Vec<String>,
    /// Target sync IDs with no local record.
    pub missing: Vec<String>,
}

/// Converts records to payloads and back.
pub struct ChangeTranslator<'a> {
    store: &'a dyn LocalStore,
    attributes: &'a SyncAttributes,
    device_id: &'a str,
    delegate: Option<&'a dyn SyncDelegate>,
}

impl<'a> ChangeTranslator<'a> {
    /// Creates a translator for the given store and configuration.
    pub fn new(store: &'a dyn LocalStore, config: &'a SyncConfig) -> Self {
        Self {
            store,
            attributes: &config.attributes,
            device_id: &config.device_id,
            delegate: None,
        }
    }

    /// Routes property selection and remote data through a delegate.
    pub fn with_delegate(mut self, delegate: Option<&'a dyn SyncDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    /// The properties of `record` that are synced.
    ///
    /// Persisted properties minus the bookkeeping attributes, narrowed by the
    /// delegate's property names and then by its property set.
    pub fn synced_properties(
        &self,
        entity: &EntityDescription,
        record: &Record,
    ) -> BTreeMap<String, PropertyDescription> {
        let mut properties = entity.persisted_properties();
        if let Some(delegate) = self.delegate {
            if let Some(names) = delegate.synced_property_names(record) {
                properties.retain(|name, _| names.iter().any(|wanted| wanted == name));
            }
            if let Some(custom) = delegate.synced_properties(&properties, record) {
                properties = custom;
            }
        }
        for reserved in [
            &self.attributes.sync_id,
            &self.attributes.is_synced,
            &self.attributes.last_device_id,
        ] {
            properties.remove(reserved);
        }
        properties
    }

    /// Builds the remote payload of a record.
    ///
    /// Relationship targets without a sync ID are left out.
    pub fn to_remote(&self, record: &Record) -> SyncResult<RemotePayload> {
        let entity = self.store.entity(record.entity())?;
        let mut payload = RemotePayload::new();
        for (name, property) in self.synced_properties(entity, record) {
            let value = record.get(&name);
            let encoded = match &property {
                PropertyDescription::Attribute(_) => encode_attribute(value),
                PropertyDescription::Relationship(relationship) => {
                    self.encode_relationship(relationship, value)?
                }
            };
            payload.insert(name, encoded);
        }
        payload.insert(
            self.attributes.last_device_id.clone(),
            Value::from(self.device_id),
        );
        Ok(payload)
    }

    /// Applies a remote payload to `record`.
    ///
    /// Every synced property takes its remote value; a missing field clears
    /// it. Fields whose type does not match are skipped, reported to the
    /// delegate and returned. Fields with no matching property are ignored.
    pub fn apply_remote(
        &self,
        record: &mut Record,
        payload: &RemotePayload,
    ) -> SyncResult<AppliedChanges> {
        let entity = self.store.entity(record.entity())?;
        let properties = self.synced_properties(entity, record);
        let mut resolver = Resolver {
            entity: entity.name().to_string(),
            record_id: record.id(),
            own_sync_id: record.get_str(&self.attributes.sync_id).map(str::to_string),
            created: BTreeMap::new(),
            related: Vec::new(),
            deferred: Vec::new(),
        };
        let mut mismatches = Vec::new();
        let mut unresolved = Vec::new();

        for (name, property) in &properties {
            let value = payload.get(name).unwrap_or(&Value::Null);
            let decoded = match property {
                PropertyDescription::Attribute(attribute) => {
                    decode_attribute(attribute.attribute_type, value)
                }
                PropertyDescription::Relationship(relationship) => {
                    resolver.deferred.clear();
                    let decoded = self.decode_relationship(relationship, value, &mut resolver)?;
                    if !resolver.deferred.is_empty() {
                        unresolved.push(UnresolvedReference {
                            relationship: name.clone(),
                            destination: relationship.destination.clone(),
                            to_many: relationship.to_many,
                            sync_ids: referenced_sync_ids(value),
                            missing: std::mem::take(&mut resolver.deferred),
                        });
                    }
                    decoded
                }
            };
            match decoded {
                Ok(local) => record.set(name.clone(), local),
                Err(expected) => {
                    let mismatch = TypeMismatch {
                        entity: entity.name().to_string(),
                        property: name.clone(),
                        expected,
                        value: value.clone(),
                    };
                    tracing::warn!(%mismatch, "skipping remote field");
                    if let Some(delegate) = self.delegate {
                        delegate.invalid_attribute(record, &mismatch);
                    }
                    mismatches.push(mismatch);
                }
            }
        }

        Ok(AppliedChanges {
            related: resolver.related,
            mismatches,
            unresolved,
        })
    }

    fn encode_relationship(
        &self,
        relationship: &RelationshipDescription,
        value: &LocalValue,
    ) -> SyncResult<Value> {
        let targets = value.object_ids().unwrap_or_default();
        let mut sync_ids = Vec::with_capacity(targets.len());
        for target in targets {
            let sync_id = self
                .store
                .fetch(target)?
                .and_then(|related| related.get_str(&self.attributes.sync_id).map(str::to_string))
                .filter(|sync_id| !sync_id.is_empty());
            match sync_id {
                Some(sync_id) => sync_ids.push(sync_id),
                None => tracing::warn!(%target, "relationship target has no sync id"),
            }
        }

        if !relationship.to_many {
            return Ok(sync_ids.into_iter().next().map_or(Value::Null, Value::Text));
        }
        if sync_ids.is_empty() {
            return Ok(Value::Null);
        }
        if !relationship.ordered {
            sync_ids.sort();
        }
        Ok(Value::Array(sync_ids.into_iter().map(Value::Text).collect()))
    }

    fn decode_relationship(
        &self,
        relationship: &RelationshipDescription,
        value: &Value,
        resolver: &mut Resolver,
    ) -> SyncResult<Result<LocalValue, ExpectedValue>> {
        if value.is_null() {
            return Ok(Ok(LocalValue::Null));
        }

        if !relationship.to_many {
            let Some(sync_id) = value.as_text() else {
                return Ok(Err(ExpectedValue::SyncId));
            };
            let target = self.resolve(&relationship.destination, sync_id, resolver)?;
            return Ok(Ok(target.map_or(LocalValue::Null, LocalValue::ToOne)));
        }

        let sync_ids: Option<Vec<&str>> = value
            .as_array()
            .and_then(|items| items.iter().map(Value::as_text).collect());
        let Some(sync_ids) = sync_ids else {
            return Ok(Err(ExpectedValue::SyncIdList));
        };
        let mut targets = Vec::with_capacity(sync_ids.len());
        for sync_id in sync_ids {
            if let Some(target) = self.resolve(&relationship.destination, sync_id, resolver)? {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        if targets.is_empty() {
            return Ok(Ok(LocalValue::Null));
        }
        Ok(Ok(LocalValue::ToMany(targets)))
    }

    /// Finds the local object with `sync_id`, creating a placeholder if none exists.
    fn resolve(
        &self,
        destination: &str,
        sync_id: &str,
        resolver: &mut Resolver,
    ) -> SyncResult<Option<ObjectId>> {
        if destination == resolver.entity && resolver.own_sync_id.as_deref() == Some(sync_id) {
            return Ok(Some(resolver.record_id));
        }
        let key = (destination.to_string(), sync_id.to_string());
        if let Some(id) = resolver.created.get(&key) {
            return Ok(Some(*id));
        }

        let existing = self.store.fetch_by_attribute(
            destination,
            &self.attributes.sync_id,
            &LocalValue::from(sync_id),
        )?;
        if let Some(existing) = existing {
            return Ok(Some(existing.id()));
        }

        let target_entity = self.store.entity(destination)?;
        if target_entity.attribute(&self.attributes.sync_id).is_none() {
            tracing::warn!(destination, "relationship target entity has no sync id attribute");
            return Ok(None);
        }
        let mut placeholder =
            Record::new(destination).with(self.attributes.sync_id.clone(), sync_id);
        if target_entity.attribute(&self.attributes.is_synced).is_some() {
            placeholder.set(self.attributes.is_synced.clone(), true);
        }
        if let Err(err) = self.store.validate(&placeholder) {
            tracing::debug!(destination, sync_id, error = %err, "deferring link to unstorable placeholder");
            if !resolver.deferred.iter().any(|deferred| deferred == sync_id) {
                resolver.deferred.push(sync_id.to_string());
            }
            return Ok(None);
        }
        tracing::debug!(destination, sync_id, "creating placeholder for relationship target");
        let id = placeholder.id();
        resolver.created.insert(key, id);
        resolver.related.push(placeholder);
        Ok(Some(id))
    }
}

struct Resolver {
    entity: String,
    record_id: ObjectId,
    own_sync_id: Option<String>,
    created: BTreeMap<(String, String), ObjectId>,
    related: Vec<Record>,
    // Targets of the current relationship left out because no placeholder could be stored.
    deferred: Vec<String>,
}

fn referenced_sync_ids(value: &Value) -> Vec<String> {
    match value {
        Value::Text(sync_id) => vec![sync_id.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_text)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Dates on whole milliseconds are written as integers; finer dates as RFC 3339 text.
fn encode_date(date: &DateTime<Utc>) -> Value {
    if date.nanosecond() % 1_000_000 == 0 {
        Value::Integer(date.timestamp_millis())
    } else {
        Value::Text(date.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}

fn decode_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Text(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|date| date.with_timezone(&Utc)),
        _ => value.as_integer().and_then(DateTime::from_timestamp_millis),
    }
}

fn encode_attribute(value: &LocalValue) -> Value {
    match value {
        LocalValue::Null => Value::Null,
        LocalValue::Bool(b) => Value::Bool(*b),
        LocalValue::Integer(n) => Value::Integer(*n),
        LocalValue::Double(f) => Value::Float(*f),
        LocalValue::String(s) => Value::Text(s.clone()),
        LocalValue::Date(date) => encode_date(date),
        LocalValue::Binary(bytes) => Value::Text(STANDARD.encode(bytes)),
        LocalValue::ToOne(_) | LocalValue::ToMany(_) => Value::Null,
    }
}

fn decode_attribute(attribute_type: AttributeType, value: &Value) -> Result<LocalValue, ExpectedValue> {
    if value.is_null() {
        return Ok(LocalValue::Null);
    }
    match attribute_type {
        AttributeType::String => value
            .as_text()
            .map(LocalValue::from)
            .ok_or(ExpectedValue::Text),
        AttributeType::Integer => value
            .as_integer()
            .map(LocalValue::Integer)
            .ok_or(ExpectedValue::Integer),
        AttributeType::Double => value
            .as_float()
            .map(LocalValue::Double)
            .ok_or(ExpectedValue::Number),
        AttributeType::Boolean => value
            .as_bool()
            .map(LocalValue::Bool)
            .ok_or(ExpectedValue::Boolean),
        AttributeType::Date => decode_date(value)
            .map(LocalValue::Date)
            .ok_or(ExpectedValue::Timestamp),
        AttributeType::Binary => value
            .as_text()
            .and_then(|text| STANDARD.decode(text).ok())
            .map(LocalValue::Binary)
            .ok_or(ExpectedValue::Base64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use relsync_store::{AttributeDescription, MemoryStore, Schema, WriteBatch};

    fn schema() -> Schema {
        Schema::new()
            .with_entity(
                EntityDescription::new("Task")
                    .with_attribute("syncID", AttributeType::String)
                    .with_attribute("isSynced", AttributeType::Boolean)
                    .with_attribute("title", AttributeType::String)
                    .with_attribute("priority", AttributeType::Integer)
                    .with_attribute("progress", AttributeType::Double)
                    .with_attribute("done", AttributeType::Boolean)
                    .with_attribute("dueDate", AttributeType::Date)
                    .with_attribute("attachment", AttributeType::Binary)
                    .with_attribute_description(
                        "scratch",
                        AttributeDescription::new(AttributeType::String).transient(),
                    )
                    .with_relationship("project", RelationshipDescription::to_one("Project"))
                    .with_relationship("tags", RelationshipDescription::to_many("Tag"))
                    .with_relationship("subtasks", RelationshipDescription::to_many("Task").ordered()),
            )
            .with_entity(
                EntityDescription::new("Project")
                    .with_attribute("syncID", AttributeType::String)
                    .with_attribute("isSynced", AttributeType::Boolean)
                    .with_attribute("name", AttributeType::String),
            )
            .with_entity(
                EntityDescription::new("Tag")
                    .with_attribute("syncID", AttributeType::String)
                    .with_attribute("label", AttributeType::String),
            )
    }

    fn store() -> MemoryStore {
        MemoryStore::new(schema())
    }

    fn config() -> SyncConfig {
        SyncConfig::new("u1", "device-a")
    }

    fn tag(sync_id: &str) -> Record {
        Record::new("Tag").with("syncID", sync_id)
    }

    #[test]
    fn encodes_attributes() {
        let store = store();
        let config = config();
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = Record::new("Task")
            .with("syncID", "t1")
            .with("isSynced", true)
            .with("title", "Write tests")
            .with("priority", 3)
            .with("progress", 0.5)
            .with("done", false)
            .with("dueDate", due)
            .with("attachment", vec![1u8, 2, 3])
            .with("scratch", "not persisted");

        let payload = ChangeTranslator::new(&store, &config).to_remote(&record).unwrap();

        assert_eq!(payload["title"], Value::from("Write tests"));
        assert_eq!(payload["priority"], Value::Integer(3));
        assert_eq!(payload["progress"], Value::Float(0.5));
        assert_eq!(payload["done"], Value::Bool(false));
        assert_eq!(payload["dueDate"], Value::Integer(due.timestamp_millis()));
        assert_eq!(payload["attachment"], Value::from("AQID"));
        assert_eq!(payload["lastDeviceID"], Value::from("device-a"));
        assert_eq!(payload["project"], Value::Null);
        assert!(!payload.contains_key("syncID"));
        assert!(!payload.contains_key("isSynced"));
        assert!(!payload.contains_key("scratch"));
    }

    #[test]
    fn encodes_relationships_as_sync_ids() {
        let store = store();
        let config = config();
        let project = Record::new("Project").with("syncID", "p1");
        let (b, a, bare) = (tag("b"), tag("a"), Record::new("Tag"));
        let first = Record::new("Task").with("syncID", "s1");
        let second = Record::new("Task").with("syncID", "s0");
        store
            .commit(
                WriteBatch::new()
                    .insert(project.clone())
                    .insert(b.clone())
                    .insert(a.clone())
                    .insert(bare.clone())
                    .insert(first.clone())
                    .insert(second.clone()),
            )
            .unwrap();

        let record = Record::new("Task")
            .with("syncID", "t1")
            .with("project", project.id())
            .with("tags", LocalValue::ToMany(vec![b.id(), bare.id(), a.id()]))
            .with("subtasks", LocalValue::ToMany(vec![first.id(), second.id()]));
        let payload = ChangeTranslator::new(&store, &config).to_remote(&record).unwrap();

        assert_eq!(payload["project"], Value::from("p1"));
        assert_eq!(payload["tags"], Value::from(vec!["a", "b"]));
        assert_eq!(payload["subtasks"], Value::from(vec!["s1", "s0"]));
    }

    #[test]
    fn decodes_attributes() {
        let store = store();
        let config = config();
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let payload: RemotePayload = [
            ("title", Value::from("Remote")),
            ("priority", Value::Float(2.0)),
            ("progress", Value::Integer(1)),
            ("done", Value::Bool(true)),
            ("dueDate", Value::Integer(due.timestamp_millis())),
            ("attachment", Value::from("AQID")),
            ("lastDeviceID", Value::from("device-b")),
            ("unknown", Value::from("ignored")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut record = Record::new("Task").with("syncID", "t1").with("scratch", "kept");
        let applied = ChangeTranslator::new(&store, &config)
            .apply_remote(&mut record, &payload)
            .unwrap();

        assert!(applied.mismatches.is_empty());
        assert!(applied.related.is_empty());
        assert_eq!(record.get_str("title"), Some("Remote"));
        assert_eq!(record.get("priority"), &LocalValue::Integer(2));
        assert_eq!(record.get("progress"), &LocalValue::Double(1.0));
        assert_eq!(record.get("done"), &LocalValue::Bool(true));
        assert_eq!(record.get("dueDate"), &LocalValue::Date(due));
        assert_eq!(record.get("attachment"), &LocalValue::Binary(vec![1, 2, 3]));
        assert_eq!(record.get_str("syncID"), Some("t1"));
        assert_eq!(record.get_str("scratch"), Some("kept"));
        assert!(record.get("unknown").is_null());
    }

    #[test]
    fn sub_millisecond_dates_keep_full_precision() {
        let store = store();
        let config = config();
        let translator = ChangeTranslator::new(&store, &config);
        let due = Utc
            .with_ymd_and_hms(2023, 11, 14, 22, 13, 20)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let record = Record::new("Task").with("syncID", "t1").with("dueDate", due);

        let payload = translator.to_remote(&record).unwrap();
        assert_eq!(payload["dueDate"], Value::from("2023-11-14T22:13:20.123456789Z"));

        let mut copy = Record::new("Task").with("syncID", "t1");
        translator.apply_remote(&mut copy, &payload).unwrap();
        assert_eq!(copy.get("dueDate"), &LocalValue::Date(due));
    }

    #[test]
    fn missing_fields_clear_properties() {
        let store = store();
        let config = config();
        let mut record = Record::new("Task").with("syncID", "t1").with("title", "Old");
        ChangeTranslator::new(&store, &config)
            .apply_remote(&mut record, &RemotePayload::new())
            .unwrap();
        assert!(record.get("title").is_null());
    }

    #[derive(Default)]
    struct Recorder {
        invalid: Mutex<Vec<String>>,
    }

    impl SyncDelegate for Recorder {
        fn invalid_attribute(&self, _record: &Record, mismatch: &TypeMismatch) {
            self.invalid.lock().push(mismatch.property.clone());
        }
    }

    #[test]
    fn type_mismatches_are_skipped_and_reported() {
        let store = store();
        let config = config();
        let recorder = Recorder::default();
        let payload: RemotePayload = [
            ("title", Value::Integer(5)),
            ("priority", Value::Integer(7)),
            ("dueDate", Value::from("tomorrow")),
            ("attachment", Value::from("not base64!")),
            ("tags", Value::from("a")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut record = Record::new("Task").with("title", "Local");
        let applied = ChangeTranslator::new(&store, &config)
            .with_delegate(Some(&recorder))
            .apply_remote(&mut record, &payload)
            .unwrap();

        let expected: Vec<_> = applied.mismatches.iter().map(|m| m.expected).collect();
        assert_eq!(
            expected,
            vec![
                ExpectedValue::Base64,
                ExpectedValue::Timestamp,
                ExpectedValue::SyncIdList,
                ExpectedValue::Text,
            ]
        );
        assert_eq!(
            *recorder.invalid.lock(),
            vec!["attachment", "dueDate", "tags", "title"]
        );
        assert_eq!(record.get_str("title"), Some("Local"));
        assert_eq!(record.get("priority"), &LocalValue::Integer(7));
    }

    #[test]
    fn unknown_relationship_targets_become_placeholders() {
        let store = store();
        let config = config();
        let known = tag("known");
        store.commit(WriteBatch::new().insert(known.clone())).unwrap();

        let payload: RemotePayload = [
            ("project", Value::from("p9")),
            ("tags", Value::from(vec!["new", "known", "new"])),
            ("subtasks", Value::from(vec!["t1"])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut record = Record::new("Task").with("syncID", "t1");
        let applied = ChangeTranslator::new(&store, &config)
            .apply_remote(&mut record, &payload)
            .unwrap();

        assert_eq!(applied.related.len(), 2);
        let project = &applied.related[0];
        assert_eq!(project.entity(), "Project");
        assert_eq!(project.get_str("syncID"), Some("p9"));
        assert_eq!(project.get("isSynced"), &LocalValue::Bool(true));
        let new_tag = &applied.related[1];
        assert!(new_tag.get("isSynced").is_null());

        assert_eq!(record.get("project"), &LocalValue::ToOne(project.id()));
        assert_eq!(
            record.get("tags"),
            &LocalValue::ToMany(vec![new_tag.id(), known.id()])
        );
        assert_eq!(record.get("subtasks"), &LocalValue::ToMany(vec![record.id()]));

        store
            .commit(
                WriteBatch::new()
                    .insert(record)
                    .insert(applied.related[0].clone())
                    .insert(applied.related[1].clone()),
            )
            .unwrap();
    }

    #[test]
    fn unstorable_placeholders_are_deferred() {
        let schema = Schema::new()
            .with_entity(
                EntityDescription::new("Task")
                    .with_attribute("syncID", AttributeType::String)
                    .with_relationship("project", RelationshipDescription::to_one("Project"))
                    .with_relationship("tags", RelationshipDescription::to_many("Tag")),
            )
            .with_entity(
                EntityDescription::new("Project")
                    .with_attribute("syncID", AttributeType::String)
                    .with_attribute_description(
                        "name",
                        AttributeDescription::new(AttributeType::String).required(),
                    ),
            )
            .with_entity(EntityDescription::new("Tag").with_attribute("syncID", AttributeType::String));
        let store = MemoryStore::new(schema);
        let config = config();
        let payload: RemotePayload = [
            ("project", Value::from("p1")),
            ("tags", Value::from(vec!["x"])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut record = Record::new("Task").with("syncID", "t1");
        let applied = ChangeTranslator::new(&store, &config)
            .apply_remote(&mut record, &payload)
            .unwrap();

        assert!(record.get("project").is_null());
        assert_eq!(applied.related.len(), 1);
        assert_eq!(applied.related[0].entity(), "Tag");
        assert_eq!(
            applied.unresolved,
            vec![UnresolvedReference {
                relationship: "project".into(),
                destination: "Project".into(),
                to_many: false,
                sync_ids: vec!["p1".into()],
                missing: vec!["p1".into()],
            }]
        );
    }

    struct TitleOnly;

    impl SyncDelegate for TitleOnly {
        fn synced_property_names(&self, _record: &Record) -> Option<Vec<String>> {
            Some(vec!["title".into(), "syncID".into(), "nope".into()])
        }

        fn synced_properties(
            &self,
            properties: &BTreeMap<String, PropertyDescription>,
            _record: &Record,
        ) -> Option<BTreeMap<String, PropertyDescription>> {
            let mut properties = properties.clone();
            properties.insert(
                "done".into(),
                PropertyDescription::Attribute(AttributeDescription::new(AttributeType::Boolean)),
            );
            Some(properties)
        }
    }

    #[test]
    fn delegate_narrows_synced_properties() {
        let store = store();
        let config = config();
        let record = Record::new("Task")
            .with("syncID", "t1")
            .with("title", "Hello")
            .with("priority", 1)
            .with("done", true);

        let payload = ChangeTranslator::new(&store, &config)
            .with_delegate(Some(&TitleOnly))
            .to_remote(&record)
            .unwrap();

        let keys: Vec<_> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["done", "lastDeviceID", "title"]);
    }
}
