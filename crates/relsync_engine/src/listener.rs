//! Remote table subscriptions.

use relsync_remote::{RemoteDatabase, RemotePath, SubscriptionHandle};
use std::fmt;
use std::sync::Arc;

/// A live subscription to one remote table.
///
/// The listener is registered before the database subscription is opened,
/// since the database may deliver the initial events before `subscribe`
/// returns. Events carry the listener's token; events whose token no longer
/// matches the registered listener are dropped.
///
/// Dropping the listener releases the subscription.
pub struct RemoteChangeListener {
    table_id: String,
    path: RemotePath,
    token: u64,
    handle: Option<SubscriptionHandle>,
    remote: Arc<dyn RemoteDatabase>,
}

impl RemoteChangeListener {
    pub(crate) fn new(
        table_id: impl Into<String>,
        path: RemotePath,
        token: u64,
        remote: Arc<dyn RemoteDatabase>,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            path,
            token,
            handle: None,
            remote,
        }
    }

    pub(crate) fn attach(&mut self, handle: SubscriptionHandle) {
        if let Some(stale) = self.handle.replace(handle) {
            self.remote.unsubscribe(stale);
        }
    }

    /// The table this listener watches.
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// The watched location.
    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    /// Identifies this listener among all listeners of a manager.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// The database subscription, once opened.
    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.handle
    }
}

impl fmt::Debug for RemoteChangeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteChangeListener")
            .field("table_id", &self.table_id)
            .field("path", &self.path)
            .field("token", &self.token)
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for RemoteChangeListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(table_id = %self.table_id, "releasing remote subscription");
            self.remote.unsubscribe(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsync_remote::{MemoryDatabase, SubscriptionEvent};

    #[test]
    fn drop_releases_subscription() {
        let remote = Arc::new(MemoryDatabase::new());
        let path = RemotePath::parse("u1/tasks").unwrap();
        let mut listener = RemoteChangeListener::new("tasks", path.clone(), 1, remote.clone());
        assert_eq!(listener.handle(), None);

        let handle = remote.subscribe(&path, Arc::new(|_: SubscriptionEvent| {}));
        listener.attach(handle);
        assert_eq!(remote.subscription_count(&path), 1);
        assert_eq!(listener.handle(), Some(handle));

        drop(listener);
        assert_eq!(remote.subscription_count(&path), 0);
    }

    #[test]
    fn reattach_releases_previous_handle() {
        let remote = Arc::new(MemoryDatabase::new());
        let path = RemotePath::parse("u1/tasks").unwrap();
        let mut listener = RemoteChangeListener::new("tasks", path.clone(), 7, remote.clone());

        listener.attach(remote.subscribe(&path, Arc::new(|_: SubscriptionEvent| {})));
        listener.attach(remote.subscribe(&path, Arc::new(|_: SubscriptionEvent| {})));
        assert_eq!(remote.subscription_count(&path), 1);
        assert_eq!(listener.token(), 7);
        assert_eq!(listener.table_id(), "tasks");
    }
}
