//! # txlock Storage
//!
//! The durable-storage boundary of the txlock object-lock manager.
//!
//! The lock manager arbitrates pending transactions in memory and hands
//! everything that must survive a crash to a [`DataManager`]. This crate
//! defines that contract together with the identifiers and records that
//! cross it.
//!
//! ## Design Principles
//!
//! - Identifiers are opaque, totally ordered tokens
//! - The lock manager never reads or writes disk directly
//! - Data managers must be `Send + Sync`
//!
//! ## Available Data Managers
//!
//! - [`InMemoryDataManager`] - For testing and ephemeral nodes
//!
//! ## Example
//!
//! ```rust
//! use txlock_storage::{DataManager, InMemoryDataManager, ObjectRevision, Oid, Tid};
//!
//! let dm = InMemoryDataManager::new();
//! let rev = ObjectRevision::inline(Oid::new(1), b"hello".to_vec());
//! dm.store_transaction(Tid::new(10), &[rev], None).unwrap();
//! dm.finish_transaction(Tid::new(10)).unwrap();
//! assert_eq!(dm.object_history(Oid::new(1), 1).unwrap(), vec![Tid::new(10)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod data_manager;
mod error;
mod memory;
mod record;
mod types;

pub use data_manager::DataManager;
pub use error::{StorageError, StorageResult};
pub use memory::{FailPoint, InMemoryDataManager, StoredTransaction};
pub use record::{Checksum, ObjectRevision, TransactionInfo};
pub use types::{NodeId, Oid, Serial, Tid, Ttid};
