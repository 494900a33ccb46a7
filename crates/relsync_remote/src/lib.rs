//! # relsync remote
//!
//! The remote side of relsync: a schema-less hierarchical database of
//! JSON-like values addressed by slash-separated paths.
//!
//! This crate provides:
//! - [`Value`], the dynamic remote value type
//! - [`RemotePath`] for addressing nodes
//! - Child events delivered to subscriptions
//! - The [`RemoteDatabase`] trait the sync engine talks to
//! - [`MemoryDatabase`], an in-memory reference implementation
//!
//! ## Write Semantics
//!
//! - `update_child` merges: only the given fields change, a `Null` field
//!   removes that field, and a node left without fields disappears
//! - `remove` deletes a node and prunes empty parents
//! - Both report success or failure through a completion callback
//!
//! ## Subscriptions
//!
//! A subscription on a path receives child-added, child-changed and
//! child-removed events for the direct children of that path. Existing
//! children are delivered as child-added when the subscription starts.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod database;
mod error;
mod event;
mod memory;
mod path;
mod value;

pub use database::{Completion, RemoteDatabase};
pub use error::{RemoteError, RemoteResult};
pub use event::{EventCallback, EventKind, RemoteEvent, SubscriptionEvent, SubscriptionHandle};
pub use memory::{MemoryDatabase, WriteOp, WriteRecord};
pub use path::RemotePath;
pub use value::{RemotePayload, Value, ValueKind};
