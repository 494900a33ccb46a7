//! # relsync store
//!
//! The local object-store side of relsync.
//!
//! This crate provides:
//! - Schema introspection types (entities, attributes, relationships)
//! - Record snapshots and the values they hold
//! - Change sets emitted after every commit
//! - The [`LocalStore`] trait the sync engine talks to
//! - [`MemoryStore`], a thread-safe in-memory reference implementation
//!
//! ## Change Notifications
//!
//! Stores emit a [`ChangeSet`] after each successful commit, in commit order.
//! Every change set carries the author of the [`WriteBatch`] that produced it,
//! so a writer can recognise (and skip) notifications for its own commits.
//!
//! ```
//! use relsync_store::{
//!     AttributeType, EntityDescription, LocalStore, LocalValue, MemoryStore, Record, Schema,
//!     WriteBatch,
//! };
//!
//! let schema = Schema::new().with_entity(
//!     EntityDescription::new("Note").with_attribute("title", AttributeType::String),
//! );
//! let store = MemoryStore::new(schema);
//!
//! let mut note = Record::new("Note");
//! note.set("title", LocalValue::from("hello"));
//! store.commit(WriteBatch::new().insert(note.clone())).unwrap();
//!
//! assert_eq!(store.fetch(note.id()).unwrap(), Some(note));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod error;
mod id;
mod memory;
mod record;
mod schema;
mod store;
mod value;

pub use change_feed::{ChangeFeed, ChangeObserver, ObserverToken};
pub use error::{StoreError, StoreResult};
pub use id::ObjectId;
pub use memory::MemoryStore;
pub use record::{ChangeSet, EntityChanges, Record, WriteBatch};
pub use schema::{
    AttributeDescription, AttributeType, EntityDescription, PropertyDescription,
    RelationshipDescription, Schema,
};
pub use store::LocalStore;
pub use value::LocalValue;
