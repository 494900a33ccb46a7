//! In-memory remote database.

use crate::database::{Completion, RemoteDatabase};
use crate::error::RemoteError;
use crate::event::{EventCallback, RemoteEvent, SubscriptionEvent, SubscriptionHandle};
use crate::path::RemotePath;
use crate::value::{RemotePayload, Value};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A write accepted by [`MemoryDatabase`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Target path.
    pub path: RemotePath,
    /// What was written.
    pub op: WriteOp,
}

/// Kind of accepted write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// A merge-write of the given fields.
    Update(RemotePayload),
    /// A node removal.
    Remove,
}

struct Subscription {
    handle: SubscriptionHandle,
    path: RemotePath,
    callback: EventCallback,
}

/// An in-memory [`RemoteDatabase`].
///
/// The database keeps:
/// - A tree of values rooted at an empty map
/// - Subscriptions, notified synchronously after every accepted write
/// - A log of accepted writes, for inspection in tests
///
/// Completions run on the writing thread after subscribers were notified.
pub struct MemoryDatabase {
    root: RwLock<Value>,
    subscriptions: RwLock<Vec<Subscription>>,
    next_handle: AtomicU64,
    offline: AtomicBool,
    writes: Mutex<Vec<WriteRecord>>,
    // Keeps event order equal to write order. Re-entrant because subscribers
    // may write from inside a callback.
    write_lock: ReentrantMutex<()>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Map(BTreeMap::new())),
            subscriptions: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
            write_lock: ReentrantMutex::new(()),
        }
    }

    /// Returns the value at `path`.
    pub fn get(&self, path: &RemotePath) -> Option<Value> {
        node_at(&self.root.read(), path).cloned()
    }

    /// Returns all accepted writes in order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    /// Returns the accepted writes targeting `path`.
    pub fn writes_to(&self, path: &RemotePath) -> Vec<WriteRecord> {
        self.writes
            .lock()
            .iter()
            .filter(|write| &write.path == path)
            .cloned()
            .collect()
    }

    /// Clears the write log.
    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Simulates connectivity loss: while offline every write fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns the number of live subscriptions on `path`.
    pub fn subscription_count(&self, path: &RemotePath) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|sub| &sub.path == path)
            .count()
    }

    /// Returns the number of live subscriptions.
    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Drops every subscription on `path`, notifying each with `reason`.
    pub fn cancel_subscriptions(&self, path: &RemotePath, reason: RemoteError) {
        let _ordered = self.write_lock.lock();
        let cancelled: Vec<EventCallback> = {
            let mut subscriptions = self.subscriptions.write();
            let (gone, kept): (Vec<_>, Vec<_>) =
                subscriptions.drain(..).partition(|sub| &sub.path == path);
            *subscriptions = kept;
            gone.into_iter().map(|sub| sub.callback).collect()
        };
        tracing::debug!(%path, count = cancelled.len(), "cancelling subscriptions");
        for callback in cancelled {
            callback(SubscriptionEvent::Cancelled(reason.clone()));
        }
    }

    fn write(&self, path: &RemotePath, op: WriteOp, completion: Completion) {
        let _ordered = self.write_lock.lock();

        if self.offline.load(Ordering::SeqCst) {
            completion(Err(RemoteError::Disconnected));
            return;
        }
        if path.is_root() {
            completion(Err(RemoteError::InvalidPath {
                path: String::new(),
                reason: "cannot write the root",
            }));
            return;
        }

        // Subscriptions above the target, with the child each one sees change.
        let watchers: Vec<(EventCallback, RemotePath)> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| sub.path.is_ancestor_of(path))
            .filter_map(|sub| {
                let key = &path.segments()[sub.path.len()];
                sub.path
                    .child(key)
                    .ok()
                    .map(|child| (sub.callback.clone(), child))
            })
            .collect();

        let events = {
            let mut root = self.root.write();
            let before: Vec<Option<Value>> = watchers
                .iter()
                .map(|(_, child)| node_at(&root, child).cloned())
                .collect();

            match &op {
                WriteOp::Update(fields) => {
                    let now_empty = {
                        let node = ensure_map(&mut root, path.segments());
                        for (key, value) in fields {
                            if value.is_null() {
                                node.remove(key);
                            } else {
                                node.insert(key.clone(), value.clone());
                            }
                        }
                        node.is_empty()
                    };
                    if now_empty {
                        remove_at(&mut root, path.segments());
                    }
                }
                WriteOp::Remove => {
                    remove_at(&mut root, path.segments());
                }
            }

            watchers
                .iter()
                .zip(before)
                .filter_map(|((callback, child), before)| {
                    let key = child.key()?.to_string();
                    let event = match (before, node_at(&root, child).cloned()) {
                        (None, Some(after)) => RemoteEvent::added(key, after),
                        (Some(before), Some(after)) if before != after => {
                            RemoteEvent::changed(key, after)
                        }
                        (Some(before), None) => RemoteEvent::removed(key, before),
                        _ => return None,
                    };
                    Some((callback.clone(), event))
                })
                .collect::<Vec<_>>()
        };

        self.writes.lock().push(WriteRecord {
            path: path.clone(),
            op,
        });

        for (callback, event) in events {
            callback(SubscriptionEvent::Child(event));
        }
        completion(Ok(()));
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteDatabase for MemoryDatabase {
    fn subscribe(&self, path: &RemotePath, callback: EventCallback) -> SubscriptionHandle {
        let _ordered = self.write_lock.lock();
        let handle = SubscriptionHandle::from_raw(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.subscriptions.write().push(Subscription {
            handle,
            path: path.clone(),
            callback: callback.clone(),
        });

        let existing: Vec<(String, Value)> = self
            .get(path)
            .and_then(|node| node.as_map().cloned())
            .map(|children| children.into_iter().collect())
            .unwrap_or_default();
        tracing::debug!(%path, ?handle, existing = existing.len(), "subscribed");

        for (key, value) in existing {
            callback(SubscriptionEvent::Child(RemoteEvent::added(key, value)));
        }
        handle
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscriptions
            .write()
            .retain(|sub| sub.handle != handle);
    }

    fn update_child(&self, path: &RemotePath, fields: RemotePayload, completion: Completion) {
        self.write(path, WriteOp::Update(fields), completion);
    }

    fn remove(&self, path: &RemotePath, completion: Completion) {
        self.write(path, WriteOp::Remove, completion);
    }
}

fn node_at<'a>(root: &'a Value, path: &RemotePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| node.get(segment))
}

/// Returns the map at `segments`, replacing non-map nodes on the way.
fn ensure_map<'a>(node: &'a mut Value, segments: &[String]) -> &'a mut BTreeMap<String, Value> {
    if !matches!(node, Value::Map(_)) {
        *node = Value::Map(BTreeMap::new());
    }
    let map = match node {
        Value::Map(map) => map,
        _ => unreachable!("node was replaced by a map"),
    };
    match segments.split_first() {
        None => map,
        Some((first, rest)) => ensure_map(map.entry(first.clone()).or_insert(Value::Null), rest),
    }
}

/// Removes the node at `segments` and prunes parents left empty.
fn remove_at(node: &mut Value, segments: &[String]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    let Value::Map(map) = node else {
        return None;
    };
    if rest.is_empty() {
        return map.remove(first);
    }
    let child = map.get_mut(first)?;
    let removed = remove_at(child, rest);
    if matches!(child, Value::Map(children) if children.is_empty()) {
        map.remove(first);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn path(p: &str) -> RemotePath {
        RemotePath::parse(p).unwrap()
    }

    fn fields(pairs: &[(&str, Value)]) -> RemotePayload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn recorder() -> (EventCallback, Arc<Mutex<Vec<SubscriptionEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (Arc::new(move |event: SubscriptionEvent| sink.lock().push(event)), seen)
    }

    fn ok() -> Completion {
        Box::new(|result: crate::RemoteResult<()>| assert!(result.is_ok()))
    }

    #[test]
    fn update_merges_fields() {
        let db = MemoryDatabase::new();
        let record = path("u1/tasks/abc");

        db.update_child(&record, fields(&[("title", "a".into()), ("done", false.into())]), ok());
        db.update_child(&record, fields(&[("done", true.into())]), ok());

        let value = db.get(&record).unwrap();
        assert_eq!(value.get("title"), Some(&Value::from("a")));
        assert_eq!(value.get("done"), Some(&Value::Bool(true)));
        assert_eq!(db.writes_to(&record).len(), 2);
    }

    #[test]
    fn null_field_removes_and_empty_node_disappears() {
        let db = MemoryDatabase::new();
        let record = path("u1/tasks/abc");

        db.update_child(&record, fields(&[("title", "a".into())]), ok());
        db.update_child(&record, fields(&[("title", Value::Null)]), ok());

        assert!(db.get(&record).is_none());
        assert!(db.get(&path("u1")).is_none());
    }

    #[test]
    fn subscription_receives_child_events() {
        let db = MemoryDatabase::new();
        let table = path("u1/tasks");
        db.update_child(&table.child("old").unwrap(), fields(&[("n", 1i64.into())]), ok());

        let (callback, seen) = recorder();
        db.subscribe(&table, callback);

        let record = table.child("abc").unwrap();
        db.update_child(&record, fields(&[("n", 1i64.into())]), ok());
        db.update_child(&record, fields(&[("n", 2i64.into())]), ok());
        db.update_child(&record, fields(&[("n", 2i64.into())]), ok());
        db.remove(&record, ok());

        let seen = seen.lock();
        assert_eq!(seen.len(), 4);
        assert_eq!(
            seen[0],
            SubscriptionEvent::Child(RemoteEvent::added(
                "old",
                Value::map([("n", Value::Integer(1))])
            ))
        );
        assert!(matches!(&seen[1], SubscriptionEvent::Child(e) if e.kind == crate::EventKind::ChildAdded && e.key == "abc"));
        assert!(matches!(&seen[2], SubscriptionEvent::Child(e) if e.kind == crate::EventKind::ChildChanged));
        assert!(matches!(&seen[3], SubscriptionEvent::Child(e) if e.kind == crate::EventKind::ChildRemoved && e.value.get("n") == Some(&Value::Integer(2))));
    }

    #[test]
    fn unsubscribe_stops_events() {
        let db = MemoryDatabase::new();
        let table = path("u1/tasks");
        let (callback, seen) = recorder();
        let handle = db.subscribe(&table, callback);
        assert_eq!(db.subscription_count(&table), 1);

        db.unsubscribe(handle);
        assert_eq!(db.subscription_count(&table), 0);

        db.update_child(&table.child("abc").unwrap(), fields(&[("n", 1i64.into())]), ok());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn offline_writes_fail() {
        let db = MemoryDatabase::new();
        db.set_offline(true);

        let failed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failed);
        db.update_child(
            &path("u1/tasks/abc"),
            fields(&[("n", 1i64.into())]),
            Box::new(move |result: crate::RemoteResult<()>| {
                flag.store(result == Err(RemoteError::Disconnected), Ordering::SeqCst)
            }),
        );

        assert!(failed.load(Ordering::SeqCst));
        assert!(db.writes().is_empty());
        assert!(db.get(&path("u1/tasks/abc")).is_none());
    }

    #[test]
    fn cancellation_notifies_and_drops() {
        let db = MemoryDatabase::new();
        let table = path("u1/tasks");
        let (callback, seen) = recorder();
        db.subscribe(&table, callback);

        db.cancel_subscriptions(&table, RemoteError::PermissionDenied { path: table.to_string() });

        assert_eq!(db.total_subscriptions(), 0);
        assert!(matches!(seen.lock()[0], SubscriptionEvent::Cancelled(_)));
    }

    #[test]
    fn callbacks_may_write() {
        let db = Arc::new(MemoryDatabase::new());
        let table = path("u1/tasks");
        let weak = Arc::downgrade(&db);
        let mirror = path("u1/mirror");
        db.subscribe(
            &table,
            Arc::new(move |event: SubscriptionEvent| {
                if let (SubscriptionEvent::Child(event), Some(db)) = (event, weak.upgrade()) {
                    let target = mirror.child(&event.key).unwrap();
                    db.update_child(&target, event.payload(), Box::new(|_| {}));
                }
            }),
        );

        db.update_child(&table.child("abc").unwrap(), fields(&[("n", 1i64.into())]), ok());
        assert_eq!(
            db.get(&path("u1/mirror/abc")).and_then(|v| v.get("n").cloned()),
            Some(Value::Integer(1))
        );
    }
}
