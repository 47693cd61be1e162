//! Pending transactions and the object-lock table.
//!
//! A transaction is registered under a temporary id (ttid), accumulates
//! object revisions, is locked once the coordinator assigns its final tid,
//! and is then either unlocked (committed) or aborted:
//!
//! ```text
//! register -> store_transaction / store_object* -> lock -> unlock
//!                     \                              \
//!                      +-> abort                      +-> abort(even_if_locked)
//! ```

mod manager;
mod state;

pub use manager::{LockEntry, TransactionManager};
pub use state::Transaction;
