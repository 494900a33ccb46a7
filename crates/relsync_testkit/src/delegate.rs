//! A delegate that records every callback.

use parking_lot::Mutex;
use relsync_engine::{SyncDelegate, SyncError, TypeMismatch};
use relsync_remote::RemotePayload;
use relsync_store::{LocalStore, Record};

/// One recorded delegate callback.
#[derive(Debug, Clone, PartialEq)]
pub enum DelegateCall {
    /// `insert_validation_failed`.
    InsertValidationFailed {
        /// The rejected record.
        record: Record,
        /// The reported error.
        error: SyncError,
    },
    /// `record_synced_from_remote`.
    SyncedFromRemote(Record),
    /// `record_synced_to_remote`.
    SyncedToRemote(Record),
    /// `invalid_attribute`.
    InvalidAttribute(TypeMismatch),
}

type Predicate = Box<dyn Fn(&Record) -> bool + Send + Sync>;
type Transform = Box<dyn Fn(RemotePayload, &str) -> RemotePayload + Send + Sync>;

/// Records callbacks and optionally steers sync.
#[derive(Default)]
pub struct RecordingDelegate {
    calls: Mutex<Vec<DelegateCall>>,
    syncable: Option<Predicate>,
    transform: Option<Transform>,
}

impl RecordingDelegate {
    /// A delegate that only records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads only records accepted by `predicate`.
    pub fn with_syncable(mut self, predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.syncable = Some(Box::new(predicate));
        self
    }

    /// Rewrites remote payloads before they are applied.
    pub fn with_transform(
        mut self,
        transform: impl Fn(RemotePayload, &str) -> RemotePayload + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<DelegateCall> {
        self.calls.lock().clone()
    }

    /// Forgets recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Records passed to `record_synced_to_remote`.
    pub fn synced_to_remote(&self) -> Vec<Record> {
        self.filter(|call| match call {
            DelegateCall::SyncedToRemote(record) => Some(record.clone()),
            _ => None,
        })
    }

    /// Records passed to `record_synced_from_remote`.
    pub fn synced_from_remote(&self) -> Vec<Record> {
        self.filter(|call| match call {
            DelegateCall::SyncedFromRemote(record) => Some(record.clone()),
            _ => None,
        })
    }

    /// Mismatches passed to `invalid_attribute`.
    pub fn invalid_attributes(&self) -> Vec<TypeMismatch> {
        self.filter(|call| match call {
            DelegateCall::InvalidAttribute(mismatch) => Some(mismatch.clone()),
            _ => None,
        })
    }

    /// Errors passed to `insert_validation_failed`.
    pub fn validation_failures(&self) -> Vec<(Record, SyncError)> {
        self.filter(|call| match call {
            DelegateCall::InsertValidationFailed { record, error } => {
                Some((record.clone(), error.clone()))
            }
            _ => None,
        })
    }

    fn filter<T>(&self, select: impl Fn(&DelegateCall) -> Option<T>) -> Vec<T> {
        self.calls.lock().iter().filter_map(select).collect()
    }

    fn record(&self, call: DelegateCall) {
        self.calls.lock().push(call);
    }
}

impl SyncDelegate for RecordingDelegate {
    fn insert_validation_failed(&self, record: &Record, error: &SyncError, _store: &dyn LocalStore) {
        self.record(DelegateCall::InsertValidationFailed {
            record: record.clone(),
            error: error.clone(),
        });
    }

    fn record_synced_from_remote(&self, record: &Record) {
        self.record(DelegateCall::SyncedFromRemote(record.clone()));
    }

    fn record_synced_to_remote(&self, record: &Record) {
        self.record(DelegateCall::SyncedToRemote(record.clone()));
    }

    fn invalid_attribute(&self, _record: &Record, mismatch: &TypeMismatch) {
        self.record(DelegateCall::InvalidAttribute(mismatch.clone()));
    }

    fn is_record_syncable(&self, record: &Record) -> bool {
        self.syncable.as_ref().map_or(true, |syncable| syncable(record))
    }

    fn transform_remote_data(&self, data: RemotePayload, entity_name: &str) -> RemotePayload {
        match &self.transform {
            Some(transform) => transform(data, entity_name),
            None => data,
        }
    }
}
