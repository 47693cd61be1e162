//! Transaction manager.

use crate::config::Config;
use crate::error::{TxnError, TxnResult};
use crate::executor::EventExecutor;
use crate::stats::ManagerStats;
use crate::transaction::state::Transaction;
use crate::wait::{ObjectWaiter, WaitQueue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use txlock_storage::{
    Checksum, DataManager, NodeId, ObjectRevision, Oid, Serial, StorageResult, Tid,
    TransactionInfo, Ttid,
};

/// Who holds an object, and whether the holder is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    /// Transaction holding the object.
    pub ttid: Ttid,
    /// Whether the holder has been locked with its final tid.
    pub locked: bool,
}

/// Arbitrates pending transactions on one storage node.
///
/// The transaction manager provides:
/// - Write-write conflict detection against committed history and against
///   other pending transactions
/// - `Delayed` answers for writes that must wait on an undecided holder
/// - Durable persistence through a [`DataManager`] once a final tid is known
/// - Retry notification through an [`EventExecutor`] and per-object waiters
///
/// ## Object states
///
/// Each object is unheld, held by one unlocked transaction, or locked by one
/// locked transaction. A store by another transaction fails with `Delayed`
/// against a held object and with `Conflict` against a locked one.
///
/// ## Threading
///
/// The manager does no internal locking. Callers serialize access, usually
/// from the node's single event loop, which `&mut self` enforces.
pub struct TransactionManager {
    config: Config,
    /// Durable storage.
    data: Arc<dyn DataManager>,
    /// Told whenever objects are freed.
    executor: Arc<dyn EventExecutor>,
    /// Tracked transactions by ttid.
    transactions: HashMap<Ttid, Transaction>,
    /// Holder of every held or locked object.
    locks: HashMap<Oid, LockEntry>,
    /// Oids locked through `lock`'s list for which no revision was stored.
    extra_locks: HashMap<Ttid, Vec<Oid>>,
    /// Ttids registered by each owner.
    owners: HashMap<NodeId, HashSet<Ttid>>,
    waiters: WaitQueue,
    stats: ManagerStats,
}

fn tracked(transactions: &HashMap<Ttid, Transaction>, ttid: Ttid) -> &Transaction {
    transactions
        .get(&ttid)
        .unwrap_or_else(|| panic!("{ttid} is not tracked"))
}

fn tracked_mut(transactions: &mut HashMap<Ttid, Transaction>, ttid: Ttid) -> &mut Transaction {
    transactions
        .get_mut(&ttid)
        .unwrap_or_else(|| panic!("{ttid} is not tracked"))
}

impl TransactionManager {
    /// Creates a transaction manager with the default configuration.
    pub fn new(data: Arc<dyn DataManager>, executor: Arc<dyn EventExecutor>) -> Self {
        Self::with_config(Config::default(), data, executor)
    }

    /// Creates a transaction manager with an explicit configuration.
    pub fn with_config(
        config: Config,
        data: Arc<dyn DataManager>,
        executor: Arc<dyn EventExecutor>,
    ) -> Self {
        Self {
            config,
            data,
            executor,
            transactions: HashMap::new(),
            locks: HashMap::new(),
            extra_locks: HashMap::new(),
            owners: HashMap::new(),
            waiters: WaitQueue::default(),
            stats: ManagerStats::default(),
        }
    }

    /// Starts tracking a new transaction.
    ///
    /// # Panics
    ///
    /// Panics if `ttid` is already tracked.
    pub fn register(&mut self, owner: NodeId, ttid: Ttid) {
        assert!(
            !self.transactions.contains_key(&ttid),
            "{ttid} is already registered"
        );

        self.transactions.insert(ttid, Transaction::new(owner, ttid));
        self.owners.entry(owner).or_default().insert(ttid);
        self.stats.registered += 1;
        debug!(%owner, %ttid, "transaction registered");
    }

    /// Attaches metadata to a tracked transaction.
    ///
    /// No conflict checking happens here; metadata may arrive before or
    /// after the objects.
    ///
    /// # Panics
    ///
    /// Panics if `ttid` is not tracked or is already locked.
    pub fn store_transaction(&mut self, ttid: Ttid, info: TransactionInfo) {
        let txn = tracked_mut(&mut self.transactions, ttid);
        assert!(!txn.is_locked(), "{ttid} is locked, its metadata is frozen");
        txn.prepare(info);
    }

    /// Stores one object revision written on top of `serial`.
    ///
    /// Decides, in order:
    /// 1. another transaction has `oid` locked: `Conflict`
    /// 2. another transaction holds `oid`: `Delayed`
    /// 3. committed history has a serial newer than `serial`: `Conflict`
    /// 4. otherwise the revision is recorded and `oid` is held by `ttid`
    ///
    /// Nothing changes when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::Conflict`], [`TxnError::Delayed`], or
    /// [`TxnError::Storage`] if committed history cannot be read.
    ///
    /// # Panics
    ///
    /// Panics if `ttid` is not tracked or is already locked.
    pub fn store_object(
        &mut self,
        ttid: Ttid,
        serial: Serial,
        revision: ObjectRevision,
    ) -> TxnResult<()> {
        let oid = revision.oid;
        let txn = tracked(&self.transactions, ttid);
        assert!(!txn.is_locked(), "{ttid} is locked, its objects are frozen");

        if let Some(entry) = self.locks.get(&oid).copied() {
            if entry.ttid != ttid {
                if entry.locked {
                    self.stats.conflicts += 1;
                    debug!(%oid, %ttid, locking = %entry.ttid, "store conflicts with locked transaction");
                    return Err(TxnError::Conflict {
                        oid,
                        ttid,
                        locking: Some(entry.ttid),
                        newer_serial: None,
                    });
                }
                self.stats.delays += 1;
                debug!(%oid, %ttid, holder = %entry.ttid, "store delayed");
                return Err(TxnError::Delayed {
                    oid,
                    ttid,
                    holder: entry.ttid,
                });
            }
        }

        let history = self
            .data
            .object_history(oid, self.config.effective_history_limit())
            .map_err(|err| {
                warn!(%oid, error = %err, "reading object history failed");
                err
            })?;
        if let Some(&newer) = history.iter().find(|&&committed| committed > serial) {
            self.stats.conflicts += 1;
            debug!(%oid, %ttid, %serial, %newer, "store based on an outdated serial");
            return Err(TxnError::Conflict {
                oid,
                ttid,
                locking: None,
                newer_serial: Some(newer),
            });
        }

        tracked_mut(&mut self.transactions, ttid).add_object(revision);
        self.locks.insert(oid, LockEntry { ttid, locked: false });
        self.stats.stored_objects += 1;
        trace!(%oid, %ttid, %serial, "object stored");
        Ok(())
    }

    /// Assigns the final tid, persists the transaction and locks its objects.
    ///
    /// Every stored object, every oid in `oid_list` and every oid named by
    /// the transaction's metadata stays locked until
    /// [`unlock`](Self::unlock) or a forced [`abort`](Self::abort).
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::Storage`] if the data manager rejects the write.
    /// The transaction is then left unlocked and unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `ttid` is not tracked, is already locked, or if an oid in
    /// `oid_list` or in the metadata is held by another transaction.
    pub fn lock(&mut self, ttid: Ttid, tid: Tid, oid_list: &[Oid]) -> TxnResult<()> {
        let txn = tracked(&self.transactions, ttid);
        assert!(!txn.is_locked(), "{ttid} is already locked");

        let listed = txn.info().map(|info| info.oid_list.as_slice()).unwrap_or_default();
        let mut extra: Vec<Oid> = oid_list
            .iter()
            .chain(listed)
            .copied()
            .filter(|oid| txn.object(*oid).is_none())
            .collect();
        extra.sort_unstable();
        extra.dedup();
        for oid in &extra {
            if let Some(entry) = self.locks.get(oid) {
                assert_eq!(
                    entry.ttid, ttid,
                    "{oid} is held by {} while locking {ttid}",
                    entry.ttid
                );
            }
        }

        if let Err(err) = self
            .data
            .store_transaction(tid, txn.object_list(), txn.info())
        {
            warn!(%ttid, %tid, error = %err, "storing locked transaction failed");
            return Err(err.into());
        }

        let txn = tracked_mut(&mut self.transactions, ttid);
        txn.set_tid(tid);
        txn.lock();
        for oid in txn.oids() {
            self.locks.insert(oid, LockEntry { ttid, locked: true });
        }
        for &oid in &extra {
            self.locks.insert(oid, LockEntry { ttid, locked: true });
        }
        if !extra.is_empty() {
            self.extra_locks.insert(ttid, extra);
        }

        self.stats.locked += 1;
        debug!(%ttid, %tid, objects = txn.object_count(), "transaction locked");
        Ok(())
    }

    /// Makes a locked transaction visible and stops tracking it.
    ///
    /// Frees its objects, releases waiters parked on them and notifies the
    /// event executor.
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::Storage`] if the data manager cannot finish the
    /// transaction. It then stays tracked and locked.
    ///
    /// # Panics
    ///
    /// Panics if `ttid` is not tracked or not locked.
    pub fn unlock(&mut self, ttid: Ttid) -> TxnResult<()> {
        let txn = tracked(&self.transactions, ttid);
        assert!(txn.is_locked(), "{ttid} is not locked");
        let tid = txn
            .tid()
            .unwrap_or_else(|| panic!("locked {ttid} has no final tid"));

        if let Err(err) = self.data.finish_transaction(tid) {
            warn!(%ttid, %tid, error = %err, "finishing transaction failed");
            return Err(err.into());
        }

        let freed = self.discard(ttid);
        self.stats.committed += 1;
        debug!(%ttid, %tid, freed = freed.len(), "transaction unlocked");
        self.release(&freed);
        Ok(())
    }

    /// Cancels a transaction.
    ///
    /// An unlocked transaction is discarded. A locked one already has its
    /// place in the commit order and is only discarded when
    /// `even_if_locked` is set. Returns whether the transaction was
    /// discarded.
    ///
    /// # Panics
    ///
    /// Panics if `ttid` is not tracked, unless the configuration ignores
    /// unknown aborts.
    pub fn abort(&mut self, ttid: Ttid, even_if_locked: bool) -> bool {
        let Some(txn) = self.transactions.get(&ttid) else {
            if self.config.ignore_unknown_abort {
                debug!(%ttid, "ignoring abort of untracked transaction");
                return false;
            }
            panic!("{ttid} is not tracked");
        };

        let was_locked = txn.is_locked();
        if was_locked && !even_if_locked {
            warn!(%ttid, "not aborting locked transaction");
            return false;
        }

        let freed = self.discard(ttid);
        self.stats.aborted += 1;
        debug!(%ttid, forced = was_locked, freed = freed.len(), "transaction aborted");
        self.release(&freed);
        true
    }

    /// Aborts every unlocked transaction owned by `owner`.
    ///
    /// Locked transactions are left alone. Freed objects are released and
    /// the event executor is notified once. Returns how many were aborted.
    pub fn abort_for(&mut self, owner: NodeId) -> usize {
        let mut ttids: Vec<Ttid> = self
            .owners
            .get(&owner)
            .into_iter()
            .flatten()
            .copied()
            .filter(|ttid| !tracked(&self.transactions, *ttid).is_locked())
            .collect();
        if ttids.is_empty() {
            return 0;
        }
        ttids.sort_unstable();

        let mut freed = Vec::new();
        for &ttid in &ttids {
            freed.extend(self.discard(ttid));
        }
        self.stats.aborted += ttids.len() as u64;
        debug!(%owner, aborted = ttids.len(), freed = freed.len(), "aborted transactions of node");
        self.release(&freed);
        ttids.len()
    }

    /// Drops every tracked transaction and lock, and releases all waiters.
    ///
    /// Statistics are kept; the dropped transactions are counted in
    /// [`ManagerStats::dropped`].
    pub fn reset(&mut self) {
        let dropped = self.transactions.len();
        self.stats.dropped += dropped as u64;
        self.transactions.clear();
        self.locks.clear();
        self.extra_locks.clear();
        self.owners.clear();

        let woken = self.waiters.release_all();
        self.stats.waiters_released += woken as u64;
        debug!(dropped, woken, "lock manager reset");
        self.executor.execute_queued_events();
    }

    /// Rewrites a pending revision whose payload pack is about to move.
    ///
    /// Only an unlocked transaction holding `oid` with a revision that
    /// points at `orig_serial` is touched. With `new_serial` the pointer is
    /// redirected and `get_object_data` is never called. Without it the
    /// payload is fetched through `get_object_data` and stored inline.
    /// Returns whether a revision was rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::Storage`] if `get_object_data` fails; the
    /// revision is then left as it was.
    pub fn update_object_data_for_pack<F>(
        &mut self,
        oid: Oid,
        orig_serial: Serial,
        new_serial: Option<Serial>,
        get_object_data: F,
    ) -> TxnResult<bool>
    where
        F: FnOnce() -> StorageResult<(bool, Checksum, Vec<u8>)>,
    {
        let Some(entry) = self.locks.get(&oid).copied() else {
            return Ok(false);
        };
        if entry.locked {
            return Ok(false);
        }

        let txn = tracked_mut(&mut self.transactions, entry.ttid);
        let Some(current) = txn.object(oid) else {
            return Ok(false);
        };
        if current.data_serial != Some(orig_serial) {
            return Ok(false);
        }

        let revision = match new_serial {
            Some(new_serial) => ObjectRevision {
                data_serial: Some(new_serial),
                ..current.clone()
            },
            None => {
                let (compression, checksum, data) = get_object_data()?;
                ObjectRevision::new(oid, compression, checksum, Some(data), None)
            }
        };
        txn.add_object(revision);

        self.stats.pack_rewrites += 1;
        debug!(%oid, ttid = %entry.ttid, %orig_serial, inline = new_serial.is_none(), "pending revision rewritten for pack");
        Ok(true)
    }

    /// Parks a waiter that is released once `oid` is no longer held.
    ///
    /// The waiter is already released if nothing holds `oid` right now.
    pub fn wait_for(&mut self, oid: Oid) -> ObjectWaiter {
        if self.locks.contains_key(&oid) {
            self.waiters.park(oid)
        } else {
            ObjectWaiter::released(oid)
        }
    }

    /// Returns the number of live waiters parked on `oid`.
    #[must_use]
    pub fn parked_waiters(&self, oid: Oid) -> usize {
        self.waiters.parked(oid)
    }

    /// Checks if `ttid` is tracked.
    #[must_use]
    pub fn contains(&self, ttid: Ttid) -> bool {
        self.transactions.contains_key(&ttid)
    }

    /// Checks if `oid` is locked by a locked transaction.
    #[must_use]
    pub fn load_locked(&self, oid: Oid) -> bool {
        self.locks.get(&oid).is_some_and(|entry| entry.locked)
    }

    /// Returns the transaction holding `oid`, locked or not.
    #[must_use]
    pub fn locking_ttid(&self, oid: Oid) -> Option<Ttid> {
        self.locks.get(&oid).map(|entry| entry.ttid)
    }

    /// Returns the lock entry of `oid`.
    #[must_use]
    pub fn lock_entry(&self, oid: Oid) -> Option<LockEntry> {
        self.locks.get(&oid).copied()
    }

    /// Returns the revision of `oid` pending in `ttid`.
    #[must_use]
    pub fn object_from_transaction(&self, ttid: Ttid, oid: Oid) -> Option<&ObjectRevision> {
        self.transactions.get(&ttid)?.object(oid)
    }

    /// Returns the final tid of `ttid`, once it is locked.
    #[must_use]
    pub fn tid_of(&self, ttid: Ttid) -> Option<Tid> {
        self.transactions.get(&ttid)?.tid()
    }

    /// Returns a tracked transaction.
    #[must_use]
    pub fn transaction(&self, ttid: Ttid) -> Option<&Transaction> {
        self.transactions.get(&ttid)
    }

    /// Returns the tracked ttids owned by `owner`, in ascending order.
    #[must_use]
    pub fn ttids_for(&self, owner: NodeId) -> Vec<Ttid> {
        let mut ttids: Vec<Ttid> = self
            .owners
            .get(&owner)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        ttids.sort_unstable();
        ttids
    }

    /// Returns the number of tracked transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Checks if no transaction is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        self.stats.clone()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stops tracking `ttid` and frees the objects it held or locked.
    fn discard(&mut self, ttid: Ttid) -> Vec<Oid> {
        let txn = self
            .transactions
            .remove(&ttid)
            .unwrap_or_else(|| panic!("{ttid} is not tracked"));

        let owner = txn.owner();
        if let Some(ttids) = self.owners.get_mut(&owner) {
            ttids.remove(&ttid);
            if ttids.is_empty() {
                self.owners.remove(&owner);
            }
        }

        let extra = self.extra_locks.remove(&ttid).unwrap_or_default();
        let mut freed = Vec::new();
        for oid in txn.oids().chain(extra) {
            if self.locks.get(&oid).is_some_and(|entry| entry.ttid == ttid) {
                self.locks.remove(&oid);
                freed.push(oid);
            }
        }
        freed
    }

    /// Wakes waiters on freed objects, then the event executor.
    fn release(&mut self, freed: &[Oid]) {
        let woken: usize = freed.iter().map(|&oid| self.waiters.release(oid)).sum();
        self.stats.waiters_released += woken as u64;
        self.executor.execute_queued_events();
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("transactions", &self.transactions.len())
            .field("locks", &self.locks.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
