//! Simulated devices for integration tests.
//!
//! Each [`TestDevice`] owns a [`MemoryStore`] and a [`SyncManager`] bound to
//! the fixture tables. Devices share one [`MemoryDatabase`] and run their
//! sync work on a [`SerialQueue`], so every change has fully propagated by
//! the time the call that caused it returns.

use crate::delegate::RecordingDelegate;
use crate::fixtures::{task_schema, PROJECT, PROJECTS_TABLE, TAG, TAGS_TABLE, TASK, TASKS_TABLE};
use relsync_engine::{SerialQueue, SyncConfig, SyncManager};
use relsync_remote::{MemoryDatabase, RemotePath, Value};
use relsync_store::{LocalStore, LocalValue, MemoryStore, ObjectId, Record, WriteBatch};
use std::sync::Arc;

/// User ID shared by the test devices.
pub const TEST_USER: &str = "user-1";

/// One simulated installation.
pub struct TestDevice {
    /// The device ID.
    pub device_id: String,
    /// The device's local store.
    pub store: Arc<MemoryStore>,
    /// The device's sync manager.
    pub manager: SyncManager,
    /// The device's delegate.
    pub delegate: Arc<RecordingDelegate>,
}

impl TestDevice {
    /// Creates a device with the default configuration.
    pub fn new(device_id: &str, remote: &Arc<MemoryDatabase>) -> Self {
        Self::with_config(SyncConfig::new(TEST_USER, device_id), remote)
    }

    /// Creates a device with a custom configuration and a recording delegate.
    pub fn with_config(config: SyncConfig, remote: &Arc<MemoryDatabase>) -> Self {
        Self::with_delegate(config, remote, RecordingDelegate::new())
    }

    /// Creates a device with a custom configuration and delegate.
    ///
    /// All fixture tables are bound; the device is not observing yet.
    pub fn with_delegate(
        config: SyncConfig,
        remote: &Arc<MemoryDatabase>,
        delegate: RecordingDelegate,
    ) -> Self {
        let device_id = config.device_id.clone();
        let store = Arc::new(MemoryStore::new(task_schema()));
        let manager = SyncManager::new(
            store.clone(),
            remote.clone(),
            Arc::new(SerialQueue::new()),
            config,
        )
        .expect("Failed to create sync manager");
        manager
            .set_tables([
                (TASK, TASKS_TABLE),
                (PROJECT, PROJECTS_TABLE),
                (TAG, TAGS_TABLE),
            ])
            .expect("Failed to bind fixture tables");
        let delegate = Arc::new(delegate);
        manager.set_delegate(&delegate);
        Self {
            device_id,
            store,
            manager,
            delegate,
        }
    }

    /// Inserts a record and returns its committed state.
    pub fn insert(&self, record: Record) -> Record {
        let id = record.id();
        self.store
            .commit(WriteBatch::new().insert(record))
            .expect("Failed to insert record");
        self.get(id).expect("Inserted record vanished")
    }

    /// Applies `edit` to a stored record and commits it.
    pub fn update(&self, id: ObjectId, edit: impl FnOnce(&mut Record)) -> Record {
        let mut record = self.get(id).expect("Record not found");
        edit(&mut record);
        self.store
            .commit(WriteBatch::new().update(record))
            .expect("Failed to update record");
        self.get(id).expect("Updated record vanished")
    }

    /// Deletes a record.
    pub fn delete(&self, id: ObjectId) {
        self.store
            .commit(WriteBatch::new().delete(id))
            .expect("Failed to delete record");
    }

    /// Fetches a record by object ID.
    pub fn get(&self, id: ObjectId) -> Option<Record> {
        self.store.fetch(id).expect("Failed to fetch record")
    }

    /// The sync ID of a stored record.
    pub fn sync_id_of(&self, id: ObjectId) -> Option<String> {
        self.get(id)
            .and_then(|record| record.get_str("syncID").map(str::to_string))
    }

    /// Finds a record by sync ID.
    pub fn find(&self, entity: &str, sync_id: &str) -> Option<Record> {
        self.store
            .fetch_by_attribute(entity, "syncID", &LocalValue::from(sync_id))
            .expect("Failed to query store")
    }
}

/// Two devices of one user sharing a remote database.
pub struct TwoDeviceHarness {
    /// The shared remote database.
    pub remote: Arc<MemoryDatabase>,
    /// First device, `device-a`.
    pub a: TestDevice,
    /// Second device, `device-b`.
    pub b: TestDevice,
}

impl TwoDeviceHarness {
    /// Creates two idle devices.
    pub fn new() -> Self {
        let remote = Arc::new(MemoryDatabase::new());
        let a = TestDevice::new("device-a", &remote);
        let b = TestDevice::new("device-b", &remote);
        Self { remote, a, b }
    }

    /// Creates two devices that are already observing.
    pub fn observing() -> Self {
        let harness = Self::new();
        harness.a.manager.start_observing();
        harness.b.manager.start_observing();
        harness
    }
}

impl Default for TwoDeviceHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// The remote path of a record.
///
/// # Panics
///
/// Panics if the segments are not valid keys.
pub fn record_path(table_id: &str, sync_id: &str) -> RemotePath {
    RemotePath::root()
        .child(TEST_USER)
        .and_then(|path| path.child(table_id))
        .and_then(|path| path.child(sync_id))
        .expect("Invalid record path")
}

/// The remote value of a record, if present.
pub fn remote_record(remote: &MemoryDatabase, table_id: &str, sync_id: &str) -> Option<Value> {
    remote.get(&record_path(table_id, sync_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::task;

    #[test]
    fn harness_propagates_inserts() {
        let harness = TwoDeviceHarness::observing();
        let created = harness.a.insert(task("Buy milk"));
        let sync_id = harness.a.sync_id_of(created.id()).unwrap();

        let remote = remote_record(&harness.remote, TASKS_TABLE, &sync_id).unwrap();
        assert_eq!(remote.get("title"), Some(&Value::from("Buy milk")));

        let copy = harness.b.find(TASK, &sync_id).unwrap();
        assert_eq!(copy.get_str("title"), Some("Buy milk"));
    }
}
