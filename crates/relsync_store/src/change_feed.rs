//! Change feed for observing committed changes.
//!
//! The change feed delivers one [`ChangeSet`] per committed write batch to
//! every registered observer. It:
//! - Emits only committed changes
//! - Preserves commit order
//! - Supports multiple observers
//! - Is thread-safe
//!
//! Observers are invoked on the committing thread, after the store has
//! released its own locks, so an observer may read from (or write to) the
//! store it observes.

use crate::record::ChangeSet;
use parking_lot::{ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback invoked with each committed change set.
pub type ChangeObserver = Arc<dyn Fn(&ChangeSet) + Send + Sync>;

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

/// Distributes committed change sets to observers.
pub struct ChangeFeed {
    observers: RwLock<Vec<(ObserverToken, ChangeObserver)>>,
    next_token: AtomicU64,
    sequence: AtomicU64,
    // Serializes emission across threads; re-entrant because observers may commit.
    emit_lock: ReentrantMutex<()>,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
            sequence: AtomicU64::new(0),
            emit_lock: ReentrantMutex::new(()),
        }
    }

    /// Registers an observer for all future change sets.
    pub fn add_observer(&self, observer: ChangeObserver) -> ObserverToken {
        let token = ObserverToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        self.observers.write().push((token, observer));
        token
    }

    /// Removes an observer. Returns false if the token was unknown.
    pub fn remove_observer(&self, token: ObserverToken) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(t, _)| *t != token);
        observers.len() != before
    }

    /// Allocates the next commit sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the latest allocated sequence number.
    pub fn latest_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Emits a change set to all observers.
    ///
    /// Empty change sets are not emitted.
    pub fn emit(&self, changes: &ChangeSet) {
        if changes.is_empty() {
            return;
        }
        let _ordered = self.emit_lock.lock();
        // Snapshot so observers can (un)register without deadlocking.
        let observers: Vec<ChangeObserver> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(changes);
        }
    }

    /// Returns the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
