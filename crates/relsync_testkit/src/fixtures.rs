//! Schema fixtures and record builders.

use chrono::{DateTime, Utc};
use relsync_store::{
    AttributeDescription, AttributeType, EntityDescription, LocalValue, ObjectId, Record,
    RelationshipDescription, Schema,
};

/// Task entity name.
pub const TASK: &str = "Task";
/// Project entity name.
pub const PROJECT: &str = "Project";
/// Tag entity name.
pub const TAG: &str = "Tag";
/// Entity without sync attributes.
pub const DRAFT: &str = "Draft";

/// Remote table of tasks.
pub const TASKS_TABLE: &str = "tasks";
/// Remote table of projects.
pub const PROJECTS_TABLE: &str = "projects";
/// Remote table of tags.
pub const TAGS_TABLE: &str = "tags";

/// The test schema.
///
/// - `Task`: required `title`, plus `done`, `priority`, `progress`,
///   `dueDate`, `attachment`, a transient `scratch`, a to-one `project`,
///   an unordered to-many `tags` and an ordered to-many `subtasks`
/// - `Project`: optional `name`
/// - `Tag`: optional `label`
/// - `Draft`: no sync attributes, cannot be bound
pub fn task_schema() -> Schema {
    Schema::new()
        .with_entity(
            synced_entity(TASK)
                .with_attribute_description(
                    "title",
                    AttributeDescription::new(AttributeType::String).required(),
                )
                .with_attribute("done", AttributeType::Boolean)
                .with_attribute("priority", AttributeType::Integer)
                .with_attribute("progress", AttributeType::Double)
                .with_attribute("dueDate", AttributeType::Date)
                .with_attribute("attachment", AttributeType::Binary)
                .with_attribute("isDeleted", AttributeType::Boolean)
                .with_attribute_description(
                    "scratch",
                    AttributeDescription::new(AttributeType::String).transient(),
                )
                .with_relationship("project", RelationshipDescription::to_one(PROJECT))
                .with_relationship("tags", RelationshipDescription::to_many(TAG))
                .with_relationship(
                    "subtasks",
                    RelationshipDescription::to_many(TASK).ordered(),
                ),
        )
        .with_entity(
            synced_entity(PROJECT)
                .with_attribute("name", AttributeType::String)
                .with_attribute("isDeleted", AttributeType::Boolean),
        )
        .with_entity(
            synced_entity(TAG)
                .with_attribute("label", AttributeType::String)
                .with_attribute("isDeleted", AttributeType::Boolean),
        )
        .with_entity(EntityDescription::new(DRAFT).with_attribute("body", AttributeType::String))
}

fn synced_entity(name: &str) -> EntityDescription {
    EntityDescription::new(name)
        .with_attribute("syncID", AttributeType::String)
        .with_attribute("isSynced", AttributeType::Boolean)
}

/// A new task with a title.
pub fn task(title: &str) -> Record {
    Record::new(TASK).with("title", title)
}

/// A new task with a title and a preassigned sync ID.
pub fn task_with_sync_id(title: &str, sync_id: &str) -> Record {
    task(title).with("syncID", sync_id)
}

/// A new project.
pub fn project(name: &str) -> Record {
    Record::new(PROJECT).with("name", name)
}

/// A new tag.
pub fn tag(label: &str) -> Record {
    Record::new(TAG).with("label", label)
}

/// A to-many value from object IDs.
pub fn to_many(ids: &[ObjectId]) -> LocalValue {
    LocalValue::ToMany(ids.to_vec())
}

/// A date from milliseconds since the epoch.
///
/// # Panics
///
/// Panics if `millis` is out of range.
pub fn date(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).expect("timestamp out of range")
}
