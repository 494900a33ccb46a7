//! Application hooks into the sync process.

use crate::error::{SyncError, TypeMismatch};
use relsync_remote::RemotePayload;
use relsync_store::{LocalStore, PropertyDescription, Record};
use std::collections::BTreeMap;

/// Optional callbacks letting the application observe and steer sync.
///
/// Every method has a default, so implementors override only what they need.
/// The manager holds its delegate weakly; callbacks run on the sync queue.
pub trait SyncDelegate: Send + Sync {
    /// A remote record could not be inserted because it failed validation.
    ///
    /// The record was not saved. The store is passed so the application can
    /// repair and commit it itself.
    fn insert_validation_failed(&self, record: &Record, error: &SyncError, store: &dyn LocalStore) {
        let _ = (record, error, store);
    }

    /// A remote change was applied to a local record.
    fn record_synced_from_remote(&self, record: &Record) {
        let _ = record;
    }

    /// A local record was written to the remote database.
    fn record_synced_to_remote(&self, record: &Record) {
        let _ = record;
    }

    /// A remote field did not match its local property and was skipped.
    fn invalid_attribute(&self, record: &Record, mismatch: &TypeMismatch) {
        let _ = (record, mismatch);
    }

    /// Decides whether a changed local record is uploaded.
    fn is_record_syncable(&self, record: &Record) -> bool {
        let _ = record;
        true
    }

    /// Restricts the synced properties of a record to the returned names.
    ///
    /// Applied before [`synced_properties`](Self::synced_properties).
    /// Unknown names are ignored.
    fn synced_property_names(&self, record: &Record) -> Option<Vec<String>> {
        let _ = record;
        None
    }

    /// Replaces the synced property set of a record.
    fn synced_properties(
        &self,
        properties: &BTreeMap<String, PropertyDescription>,
        record: &Record,
    ) -> Option<BTreeMap<String, PropertyDescription>> {
        let _ = (properties, record);
        None
    }

    /// Rewrites a remote payload before it is applied.
    fn transform_remote_data(&self, data: RemotePayload, entity_name: &str) -> RemotePayload {
        let _ = entity_name;
        data
    }
}
