//! # relsync testkit
//!
//! Test utilities for relsync.
//!
//! This crate provides:
//! - A Task/Project/Tag schema and record builders
//! - Simulated devices sharing one in-memory remote database
//! - A delegate that records every callback
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use relsync_testkit::prelude::*;
//!
//! let harness = TwoDeviceHarness::observing();
//! let task = harness.a.insert(task("Buy milk"));
//! let sync_id = harness.a.sync_id_of(task.id()).unwrap();
//! assert!(harness.b.find(TASK, &sync_id).is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod delegate;
pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::delegate::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::integration::*;
}

pub use delegate::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;

use std::sync::Once;

/// Installs a test subscriber for `tracing` once per process.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
