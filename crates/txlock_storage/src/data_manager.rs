//! Data manager trait definition.

use crate::error::StorageResult;
use crate::record::{ObjectRevision, TransactionInfo};
use crate::types::{Oid, Serial, Tid};

/// The durable-storage collaborator of the lock manager.
///
/// The lock manager never touches disk itself. It reads committed history
/// to detect stale writes, and hands locked transactions here to be made
/// durable and then visible.
///
/// # Invariants
///
/// - `object_history` returns serials newest first
/// - `store_transaction` is called at most once per tid
/// - `finish_transaction` is only called for a tid that was stored
/// - Implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryDataManager`] - For testing and ephemeral nodes
pub trait DataManager: Send + Sync {
    /// Returns up to `limit` committed serials of `oid`, newest first.
    ///
    /// An object with no committed revision has an empty history.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    fn object_history(&self, oid: Oid, limit: usize) -> StorageResult<Vec<Serial>>;

    /// Durably persists a locked transaction's objects and metadata.
    ///
    /// The data is not visible to readers until `finish_transaction`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or `tid` was already stored.
    fn store_transaction(
        &self,
        tid: Tid,
        objects: &[ObjectRevision],
        info: Option<&TransactionInfo>,
    ) -> StorageResult<()>;

    /// Makes a previously stored transaction committed and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if `tid` was never stored or is already finished.
    fn finish_transaction(&self, tid: Tid) -> StorageResult<()>;
}
