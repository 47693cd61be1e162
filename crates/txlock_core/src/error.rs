//! Error types for the lock manager.
//!
//! Only outcomes a correct caller can legitimately run into are errors.
//! Protocol violations (double register, double lock, unlock without lock,
//! unknown ttid) are bugs in the caller and panic instead.

use thiserror::Error;
use txlock_storage::{Oid, Serial, StorageError, Ttid};

/// Result type for lock manager operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors surfaced by [`TransactionManager`](crate::TransactionManager).
#[derive(Debug, Error)]
pub enum TxnError {
    /// The write is provably stale and cannot succeed by waiting.
    ///
    /// Either another transaction with an assigned tid has the object
    /// locked, or durable history already holds a newer serial.
    #[error("write conflict on {oid} for {ttid}")]
    Conflict {
        /// Object the write targeted.
        oid: Oid,
        /// Transaction that attempted the write.
        ttid: Ttid,
        /// Transaction holding the object locked, if that was the cause.
        locking: Option<Ttid>,
        /// Newer committed serial, if that was the cause.
        newer_serial: Option<Serial>,
    },

    /// Another unlocked transaction holds the object; retry once it is freed.
    #[error("{oid} is held by {holder}, {ttid} must wait")]
    Delayed {
        /// Object the write targeted.
        oid: Oid,
        /// Transaction that attempted the write.
        ttid: Ttid,
        /// Transaction currently holding the object.
        holder: Ttid,
    },

    /// A data manager call failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TxnError {
    /// Returns true for [`TxnError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, TxnError::Conflict { .. })
    }

    /// Returns true for [`TxnError::Delayed`].
    pub fn is_delayed(&self) -> bool {
        matches!(self, TxnError::Delayed { .. })
    }

    /// Returns true if re-issuing the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_delayed()
    }

    /// Returns the object the failed write targeted, if any.
    pub fn oid(&self) -> Option<Oid> {
        match self {
            TxnError::Conflict { oid, .. } | TxnError::Delayed { oid, .. } => Some(*oid),
            TxnError::Storage(_) => None,
        }
    }
}
