//! # txlock Testkit
//!
//! Test utilities for txlock.
//!
//! This crate provides:
//! - A transaction manager pre-wired to in-memory collaborators
//! - An executor that queues and re-drives delayed stores
//! - Property-based test generators using proptest
//! - An operation runner that checks lock-table invariants
//!
//! ## Usage
//!
//! ```rust
//! use txlock_testkit::prelude::*;
//! use txlock_core::Tid;
//!
//! let mut h = TestManager::new();
//! let ttid = h.begin();
//! h.store_object(ttid, Tid::ZERO, revision(1, b"v1")).unwrap();
//! h.commit(ttid, Tid::new(10)).unwrap();
//! assert!(h.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
