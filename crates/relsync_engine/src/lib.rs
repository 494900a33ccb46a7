//! # relsync engine
//!
//! Bidirectional, real-time sync between a local object store and a remote
//! hierarchical database.
//!
//! This crate provides:
//! - Entity to table bindings, validated against the local schema
//! - Translation of records to remote payloads and back
//! - Per-table remote subscriptions and a local change observer
//! - Upload/download progress and notifications
//! - Application hooks through [`SyncDelegate`]
//!
//! ## Architecture
//!
//! A [`SyncManager`] sits between a [`LocalStore`](relsync_store::LocalStore)
//! and a [`RemoteDatabase`](relsync_remote::RemoteDatabase):
//! 1. Local commits are partitioned by entity, given sync IDs if missing,
//!    and merge-written to `<user>/<table>/<syncID>`
//! 2. Remote child events are translated and committed locally
//! 3. Both directions run serially on one [`DispatchQueue`]
//!
//! ## Key Invariants
//!
//! - A sync ID identifies one logical record on both sides and never changes
//! - Remote events written by this device are discarded
//! - Local commits made by the manager are never uploaded again
//! - One bad record or field never blocks the rest of a batch
//! - After `stop_observing` returns, no remote event touches the local store
//!
//! ```
//! use relsync_engine::{SerialQueue, SyncConfig, SyncManager};
//! use relsync_remote::MemoryDatabase;
//! use relsync_store::{AttributeType, EntityDescription, MemoryStore, Schema};
//! use std::sync::Arc;
//!
//! let schema = Schema::new().with_entity(
//!     EntityDescription::new("Note")
//!         .with_attribute("syncID", AttributeType::String)
//!         .with_attribute("isSynced", AttributeType::Boolean)
//!         .with_attribute("text", AttributeType::String),
//! );
//! let manager = SyncManager::new(
//!     Arc::new(MemoryStore::new(schema)),
//!     Arc::new(MemoryDatabase::new()),
//!     Arc::new(SerialQueue::new()),
//!     SyncConfig::new("user-1", "phone"),
//! )
//! .unwrap();
//!
//! manager.set_table("notes", "Note").unwrap();
//! manager.start_observing();
//! assert!(manager.is_observing());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod delegate;
mod error;
mod listener;
mod manager;
mod queue;
mod status;
mod sync_id;
mod table_map;
mod translator;

pub use config::{
    LocalDeletePolicy, RemoteDeletePolicy, SyncAttributes, SyncConfig,
    DEFAULT_IS_SYNCED_ATTRIBUTE_NAME, DEFAULT_LAST_DEVICE_ID_ATTRIBUTE_NAME,
    DEFAULT_SYNC_ATTRIBUTE_NAME, DEFAULT_TOMBSTONE_FIELD,
};
pub use delegate::SyncDelegate;
pub use error::{ExpectedValue, SyncError, SyncResult, TypeMismatch};
pub use listener::RemoteChangeListener;
pub use manager::SyncManager;
pub use queue::{DispatchQueue, Job, SerialQueue, TokioQueue};
pub use status::{IncomingChanges, SyncNotification, SyncStatus};
pub use sync_id::{default_factory, sync_id, SyncIdFactory};
pub use table_map::{EntityTableBinding, EntityTableMap};
pub use translator::{AppliedChanges, ChangeTranslator, UnresolvedReference};
