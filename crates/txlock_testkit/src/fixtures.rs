//! Test fixtures and manager helpers.
//!
//! Provides a transaction manager pre-wired to an in-memory data manager
//! and an executor that models a node's queue of deferred requests.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use txlock_core::{
    Checksum, Config, EventExecutor, NodeId, ObjectRevision, Oid, Serial, Tid, TransactionInfo,
    TransactionManager, TxnError, TxnResult, Ttid,
};
use txlock_storage::InMemoryDataManager;

/// Installs a `tracing` subscriber for tests.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Safe to call
/// from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A store request that was answered with `Delayed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredStore {
    /// Transaction that issued the store.
    pub ttid: Ttid,
    /// Serial the write was based on.
    pub serial: Serial,
    /// The revision to store.
    pub revision: ObjectRevision,
}

/// Event executor that queues deferred stores like a storage node does.
///
/// Stores are parked with [`defer`](Self::defer). Each
/// `execute_queued_events` call moves everything parked so far to the
/// ready list, from which the test re-drives them.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: AtomicUsize,
    queued: Mutex<Vec<DeferredStore>>,
    ready: Mutex<Vec<DeferredStore>>,
}

impl RecordingExecutor {
    /// Creates an executor with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times the manager notified this executor.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Parks a deferred store until the next notification.
    pub fn defer(&self, store: DeferredStore) {
        self.queued.lock().push(store);
    }

    /// Returns the number of stores still waiting for a notification.
    pub fn queued(&self) -> usize {
        self.queued.lock().len()
    }

    /// Takes every store released by a notification.
    pub fn take_ready(&self) -> Vec<DeferredStore> {
        std::mem::take(&mut *self.ready.lock())
    }
}

impl EventExecutor for RecordingExecutor {
    fn execute_queued_events(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queued = self.queued.lock();
        self.ready.lock().append(&mut queued);
    }
}

/// A transaction manager wired to in-memory collaborators.
pub struct TestManager {
    /// The manager under test.
    pub tm: TransactionManager,
    /// Its data manager.
    pub dm: Arc<InMemoryDataManager>,
    /// Its event executor.
    pub executor: Arc<RecordingExecutor>,
    /// Default owner of transactions started with [`begin`](Self::begin).
    pub node: NodeId,
    next_ttid: u64,
}

impl TestManager {
    /// Creates a manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a manager with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let dm = Arc::new(InMemoryDataManager::new());
        let executor = Arc::new(RecordingExecutor::new());
        Self {
            tm: TransactionManager::with_config(config, dm.clone(), executor.clone()),
            dm,
            executor,
            node: NodeId::new(),
            next_ttid: 1,
        }
    }

    /// Registers a new transaction owned by the default node.
    pub fn begin(&mut self) -> Ttid {
        self.begin_for(self.node)
    }

    /// Registers a new transaction owned by `owner`.
    pub fn begin_for(&mut self, owner: NodeId) -> Ttid {
        let ttid = Ttid::new(self.next_ttid);
        self.next_ttid += 1;
        self.tm.register(owner, ttid);
        ttid
    }

    /// Stores a revision, parking it on the executor if it is delayed.
    ///
    /// Returns `Ok(true)` if stored and `Ok(false)` if deferred.
    pub fn store_or_defer(
        &mut self,
        ttid: Ttid,
        serial: Serial,
        revision: ObjectRevision,
    ) -> TxnResult<bool> {
        match self.tm.store_object(ttid, serial, revision.clone()) {
            Ok(()) => Ok(true),
            Err(TxnError::Delayed { .. }) => {
                self.executor.defer(DeferredStore {
                    ttid,
                    serial,
                    revision,
                });
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Re-issues every deferred store the executor released.
    ///
    /// Stores of transactions that are gone by now are dropped. Returns
    /// the outcome of each re-issued store.
    pub fn redrive(&mut self) -> Vec<TxnResult<bool>> {
        let mut outcomes = Vec::new();
        for store in self.executor.take_ready() {
            if self.tm.contains(store.ttid) {
                outcomes.push(self.store_or_defer(store.ttid, store.serial, store.revision));
            }
        }
        outcomes
    }

    /// Locks `ttid` over the objects it holds, then unlocks it.
    pub fn commit(&mut self, ttid: Ttid, tid: Tid) -> TxnResult<()> {
        let oids: Vec<Oid> = self
            .tm
            .transaction(ttid)
            .map(|txn| txn.oids().collect())
            .unwrap_or_default();
        self.tm.lock(ttid, tid, &oids)?;
        self.tm.unlock(ttid)
    }
}

impl Default for TestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestManager {
    type Target = TransactionManager;

    fn deref(&self) -> &Self::Target {
        &self.tm
    }
}

impl std::ops::DerefMut for TestManager {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tm
    }
}

/// Builds an inline revision of `oid`.
pub fn revision(oid: u64, data: &[u8]) -> ObjectRevision {
    ObjectRevision::inline(Oid::new(oid), data.to_vec())
}

/// Builds a revision of `oid` that reuses the payload stored at `serial`.
pub fn indirect_revision(oid: u64, serial: u64) -> ObjectRevision {
    ObjectRevision::indirect(Oid::new(oid), Checksum::of(&oid.to_be_bytes()), Tid::new(serial))
}

/// Builds transaction metadata listing `oids`.
pub fn info_for(oids: &[u64]) -> TransactionInfo {
    TransactionInfo::new(
        oids.iter().copied().map(Oid::new).collect(),
        "tester",
        "test transaction",
        Vec::new(),
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_allocates_fresh_ttids() {
        let mut h = TestManager::new();
        let a = h.begin();
        let b = h.begin();

        assert_ne!(a, b);
        assert!(h.contains(a));
        assert_eq!(h.ttids_for(h.node), vec![a, b]);
    }

    #[test]
    fn delayed_store_is_parked_until_notified() {
        let mut h = TestManager::new();
        let t1 = h.begin();
        let t2 = h.begin();
        assert!(h.store_or_defer(t1, Tid::ZERO, revision(1, b"a")).unwrap());
        assert!(!h.store_or_defer(t2, Tid::ZERO, revision(1, b"b")).unwrap());

        assert_eq!(h.executor.queued(), 1);
        assert!(h.redrive().is_empty());

        h.abort(t1, false);
        let outcomes = h.redrive();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Ok(true)));
        assert_eq!(h.locking_ttid(Oid::new(1)), Some(t2));
    }

    #[test]
    fn commit_locks_and_unlocks() {
        let mut h = TestManager::new();
        let t1 = h.begin();
        h.store_object(t1, Tid::ZERO, revision(1, b"a")).unwrap();
        h.commit(t1, Tid::new(5)).unwrap();

        assert!(!h.contains(t1));
        assert_eq!(h.dm.finished(), vec![Tid::new(5)]);
        assert_eq!(h.executor.calls(), 1);
    }

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
