//! Error types for data manager operations.

use crate::types::Tid;
use std::io;
use thiserror::Error;

/// Result type for data manager operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors a [`DataManager`](crate::DataManager) can report.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred in the underlying store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `finish_transaction` was called for a tid that was never stored.
    #[error("no stored transaction with {0}")]
    UnknownTransaction(Tid),

    /// A transaction with this tid has already been stored.
    #[error("transaction {0} already stored")]
    AlreadyStored(Tid),

    /// The transaction has already been finished.
    #[error("transaction {0} already finished")]
    AlreadyFinished(Tid),

    /// The store cannot serve the request right now.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
