//! Subscription events.

use crate::error::RemoteError;
use crate::value::{RemotePayload, Value};
use std::sync::Arc;

/// Kind of child event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A child appeared (or existed when the subscription started).
    ChildAdded,
    /// A child's value changed.
    ChildChanged,
    /// A child was removed. The event carries its last value.
    ChildRemoved,
}

/// A change to one child of a subscribed location.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    /// Kind of change.
    pub kind: EventKind,
    /// Key of the child.
    pub key: String,
    /// Value of the child (the last value for removals).
    pub value: Value,
}

impl RemoteEvent {
    /// Creates a child-added event.
    pub fn added(key: impl Into<String>, value: Value) -> Self {
        Self {
            kind: EventKind::ChildAdded,
            key: key.into(),
            value,
        }
    }

    /// Creates a child-changed event.
    pub fn changed(key: impl Into<String>, value: Value) -> Self {
        Self {
            kind: EventKind::ChildChanged,
            key: key.into(),
            value,
        }
    }

    /// Creates a child-removed event.
    pub fn removed(key: impl Into<String>, value: Value) -> Self {
        Self {
            kind: EventKind::ChildRemoved,
            key: key.into(),
            value,
        }
    }

    /// Returns the child value as a flat payload.
    pub fn payload(&self) -> RemotePayload {
        self.value.clone().into_payload()
    }
}

/// Something delivered to a subscription callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// A child event.
    Child(RemoteEvent),
    /// The subscription was dropped by the database. No further events follow.
    Cancelled(RemoteError),
}

/// Callback receiving subscription events.
pub type EventCallback = Arc<dyn Fn(SubscriptionEvent) + Send + Sync>;

/// Opaque handle of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Creates a handle from a raw id.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}
