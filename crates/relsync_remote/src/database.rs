//! The remote database interface used by the sync engine.

use crate::error::RemoteResult;
use crate::event::{EventCallback, SubscriptionHandle};
use crate::path::RemotePath;
use crate::value::RemotePayload;

/// Completion callback of an asynchronous write.
pub type Completion = Box<dyn FnOnce(RemoteResult<()>) + Send + 'static>;

/// A schema-less hierarchical database.
///
/// This trait abstracts the network client, allowing for different
/// implementations (a realtime database SDK, a REST client, the in-memory
/// [`MemoryDatabase`](crate::MemoryDatabase) for tests, etc.). Transport,
/// authentication and reconnection are the implementation's concern.
///
/// Callbacks and completions may be invoked on any thread, including the
/// calling thread before the method returns.
pub trait RemoteDatabase: Send + Sync {
    /// Subscribes to child events of `path`.
    ///
    /// Existing children are delivered as child-added events.
    fn subscribe(&self, path: &RemotePath, callback: EventCallback) -> SubscriptionHandle;

    /// Releases a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Merges `fields` into the node at `path`.
    ///
    /// Fields not mentioned are left untouched; a `Null` field removes that field.
    fn update_child(&self, path: &RemotePath, fields: RemotePayload, completion: Completion);

    /// Removes the node at `path`.
    fn remove(&self, path: &RemotePath, completion: Completion);
}
