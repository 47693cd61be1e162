//! In-memory data manager for testing.

use crate::data_manager::DataManager;
use crate::error::{StorageError, StorageResult};
use crate::record::{ObjectRevision, TransactionInfo};
use crate::types::{Oid, Serial, Tid};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Operation that an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// The next `object_history` call fails.
    History,
    /// The next `store_transaction` call fails.
    Store,
    /// The next `finish_transaction` call fails.
    Finish,
}

/// A transaction handed to [`DataManager::store_transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTransaction {
    /// Final transaction id.
    pub tid: Tid,
    /// Object revisions, in the order they were handed over.
    pub objects: Vec<ObjectRevision>,
    /// Attached metadata, if any was stored.
    pub info: Option<TransactionInfo>,
    /// Whether `finish_transaction` has been called.
    pub finished: bool,
}

#[derive(Debug, Default)]
struct State {
    /// Committed serials per object, oldest first.
    history: HashMap<Oid, Vec<Serial>>,
    /// Stored transactions in store order.
    stored: Vec<StoredTransaction>,
    finish_order: Vec<Tid>,
    fail_next: Option<FailPoint>,
}

impl State {
    fn take_failure(&mut self, point: FailPoint) -> StorageResult<()> {
        if self.fail_next == Some(point) {
            self.fail_next = None;
            return Err(StorageError::unavailable(format!("injected {point:?} failure")));
        }
        Ok(())
    }
}

/// An in-memory data manager.
///
/// Keeps committed history per object and every stored transaction, and
/// exposes both for inspection. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral nodes that don't need persistence
///
/// Finishing a transaction appends its tid to the history of each of its
/// objects, so later conflict checks see the commit.
///
/// # Example
///
/// ```rust
/// use txlock_storage::{DataManager, InMemoryDataManager, Oid, Tid};
///
/// let dm = InMemoryDataManager::new();
/// dm.commit_history(Oid::new(1), Tid::new(5));
/// assert_eq!(dm.object_history(Oid::new(1), 1).unwrap(), vec![Tid::new(5)]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDataManager {
    state: RwLock<State>,
}

impl InMemoryDataManager {
    /// Creates an empty data manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `serial` as the newest committed revision of `oid`.
    ///
    /// Useful for seeding durable history in tests.
    pub fn commit_history(&self, oid: Oid, serial: Serial) {
        self.state.write().history.entry(oid).or_default().push(serial);
    }

    /// Makes the next call of the given kind fail with `Unavailable`.
    pub fn fail_next(&self, point: FailPoint) {
        self.state.write().fail_next = Some(point);
    }

    /// Returns a copy of every stored transaction, in store order.
    #[must_use]
    pub fn stored_transactions(&self) -> Vec<StoredTransaction> {
        self.state.read().stored.clone()
    }

    /// Returns the stored transaction with the given tid.
    #[must_use]
    pub fn stored(&self, tid: Tid) -> Option<StoredTransaction> {
        self.state
            .read()
            .stored
            .iter()
            .find(|txn| txn.tid == tid)
            .cloned()
    }

    /// Returns the tids of finished transactions, in finish order.
    #[must_use]
    pub fn finished(&self) -> Vec<Tid> {
        self.state.read().finish_order.clone()
    }

    /// Clears all history and stored transactions.
    pub fn clear(&self) {
        *self.state.write() = State::default();
    }
}

impl DataManager for InMemoryDataManager {
    fn object_history(&self, oid: Oid, limit: usize) -> StorageResult<Vec<Serial>> {
        let mut state = self.state.write();
        state.take_failure(FailPoint::History)?;

        Ok(state
            .history
            .get(&oid)
            .map(|serials| serials.iter().rev().take(limit).copied().collect())
            .unwrap_or_default())
    }

    fn store_transaction(
        &self,
        tid: Tid,
        objects: &[ObjectRevision],
        info: Option<&TransactionInfo>,
    ) -> StorageResult<()> {
        let mut state = self.state.write();
        state.take_failure(FailPoint::Store)?;

        if state.stored.iter().any(|txn| txn.tid == tid) {
            return Err(StorageError::AlreadyStored(tid));
        }

        state.stored.push(StoredTransaction {
            tid,
            objects: objects.to_vec(),
            info: info.cloned(),
            finished: false,
        });
        Ok(())
    }

    fn finish_transaction(&self, tid: Tid) -> StorageResult<()> {
        let mut state = self.state.write();
        state.take_failure(FailPoint::Finish)?;

        let State {
            history,
            stored,
            finish_order,
            ..
        } = &mut *state;
        let txn = stored
            .iter_mut()
            .find(|txn| txn.tid == tid)
            .ok_or(StorageError::UnknownTransaction(tid))?;

        if txn.finished {
            return Err(StorageError::AlreadyFinished(tid));
        }

        for object in &txn.objects {
            history.entry(object.oid).or_default().push(tid);
        }
        txn.finished = true;
        finish_order.push(tid);
        Ok(())
    }
}
