//! # txlock Core
//!
//! Per-node transaction and object-lock manager for MVCC object storage.
//!
//! This crate provides:
//! - Tracking of pending transactions by temporary id
//! - Write-write conflict detection against committed history
//! - `Delayed` answers for writes blocked by an undecided transaction
//! - Lock, unlock and abort lifecycle with durable hand-off to a [`DataManager`]
//! - Per-object waiters released when objects are freed
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use txlock_core::{NodeId, NoopExecutor, ObjectRevision, Oid, Tid, TransactionManager, Ttid};
//! use txlock_storage::InMemoryDataManager;
//!
//! let dm = Arc::new(InMemoryDataManager::new());
//! let mut tm = TransactionManager::new(dm.clone(), Arc::new(NoopExecutor));
//!
//! let ttid = Ttid::new(1);
//! tm.register(NodeId::new(), ttid);
//! tm.store_object(ttid, Tid::ZERO, ObjectRevision::inline(Oid::new(1), b"v1".to_vec()))
//!     .unwrap();
//! tm.lock(ttid, Tid::new(10), &[Oid::new(1)]).unwrap();
//! tm.unlock(ttid).unwrap();
//!
//! assert!(!tm.contains(ttid));
//! assert_eq!(dm.finished(), vec![Tid::new(10)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod stats;
mod transaction;
mod wait;

pub use config::Config;
pub use error::{TxnError, TxnResult};
pub use executor::{EventExecutor, NoopExecutor};
pub use stats::ManagerStats;
pub use transaction::{LockEntry, Transaction, TransactionManager};
pub use wait::ObjectWaiter;

pub use txlock_storage::{
    Checksum, DataManager, NodeId, ObjectRevision, Oid, Serial, StorageError, StorageResult, Tid,
    TransactionInfo, Ttid,
};
