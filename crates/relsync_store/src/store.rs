//! The local store interface used by the sync engine.

use crate::change_feed::{ChangeObserver, ObserverToken};
use crate::error::{StoreError, StoreResult};
use crate::id::ObjectId;
use crate::record::{ChangeSet, Record, WriteBatch};
use crate::schema::{EntityDescription, Schema};
use crate::value::LocalValue;

/// A relationally-structured local object store.
///
/// Implementations own persistence, querying and validation. All methods
/// must be callable from any thread; a store that is confined to one thread
/// is expected to hop onto it internally and wait for the result.
pub trait LocalStore: Send + Sync {
    /// Returns the schema.
    fn schema(&self) -> &Schema;

    /// Looks up an entity description.
    fn entity(&self, name: &str) -> StoreResult<&EntityDescription> {
        self.schema()
            .entity(name)
            .ok_or_else(|| StoreError::unknown_entity(name))
    }

    /// Fetches an object by ID.
    fn fetch(&self, id: ObjectId) -> StoreResult<Option<Record>>;

    /// Fetches the first object of an entity whose attribute equals `value`.
    fn fetch_by_attribute(
        &self,
        entity: &str,
        attribute: &str,
        value: &LocalValue,
    ) -> StoreResult<Option<Record>>;

    /// Validates a record against the schema without saving it.
    fn validate(&self, record: &Record) -> StoreResult<()>;

    /// Commits a batch atomically and notifies observers.
    fn commit(&self, batch: WriteBatch) -> StoreResult<ChangeSet>;

    /// Registers a change observer.
    fn add_observer(&self, observer: ChangeObserver) -> ObserverToken;

    /// Removes a change observer.
    fn remove_observer(&self, token: ObserverToken);
}
