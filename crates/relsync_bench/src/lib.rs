//! Benchmark utilities.

use relsync_remote::{RemotePayload, Value};
use relsync_store::{LocalStore, MemoryStore, Record, WriteBatch};
use relsync_testkit::fixtures::{date, tag, task_schema, task_with_sync_id, to_many};

/// A store holding `tags` tags and one fully populated task referencing them.
///
/// # Panics
///
/// Panics if the fixture records do not validate.
pub fn populated_store(tags: usize) -> (MemoryStore, Record) {
    let store = MemoryStore::new(task_schema());
    let tag_records: Vec<Record> = (0..tags)
        .map(|n| tag(&format!("tag-{n}")).with("syncID", format!("tag{n:04}")))
        .collect();
    let ids: Vec<_> = tag_records.iter().map(Record::id).collect();
    let task = task_with_sync_id("Benchmark task", "task0001")
        .with("done", false)
        .with("priority", 3_i64)
        .with("progress", 0.5)
        .with("dueDate", date(1_700_000_000_000))
        .with("attachment", vec![7u8; 256])
        .with("tags", to_many(&ids));

    let mut batch = WriteBatch::new();
    for record in tag_records {
        batch = batch.insert(record);
    }
    store
        .commit(batch.insert(task.clone()))
        .expect("Failed to populate store");
    (store, task)
}

/// A remote task payload referencing `tags` tags.
pub fn task_payload(tags: usize) -> RemotePayload {
    let tag_ids: Vec<Value> = (0..tags)
        .map(|n| Value::from(format!("tag{n:04}")))
        .collect();
    [
        ("title", Value::from("Remote task")),
        ("done", Value::Bool(true)),
        ("priority", Value::Integer(5)),
        ("progress", Value::Float(0.75)),
        ("dueDate", Value::Integer(1_700_000_000_000)),
        ("attachment", Value::from("BwcHBwcHBwc=")),
        ("tags", Value::Array(tag_ids)),
        ("lastDeviceID", Value::from("device-b")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}
