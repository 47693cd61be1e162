//! Operation runner and lock-table invariant checks.
//!
//! Drives a [`TestManager`] through generated [`Op`] sequences while only
//! issuing calls whose preconditions hold, so the manager's fatal
//! assertions never fire and every outcome is a legitimate one.

use crate::fixtures::TestManager;
use crate::generators::Op;
use txlock_core::{NodeId, Oid, Tid, TransactionManager, TxnError, Ttid};

/// Tally of what happened while applying operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Stores that were accepted.
    pub stored: usize,
    /// Stores rejected with `Conflict`.
    pub conflicts: usize,
    /// Stores rejected with `Delayed`.
    pub delays: usize,
    /// Transactions locked.
    pub locked: usize,
    /// Transactions unlocked.
    pub unlocked: usize,
    /// Transactions discarded by `abort` or `abort_for`.
    pub aborted: usize,
    /// Operations skipped because their preconditions did not hold.
    pub skipped: usize,
}

/// Applies generated operations to a manager.
#[derive(Debug)]
pub struct OpRunner {
    owners: Vec<NodeId>,
    ttids: Vec<Ttid>,
    max_oid: u64,
    next_tid: u64,
    /// What happened so far.
    pub report: RunReport,
}

impl OpRunner {
    /// Creates a runner over `owners` touching oids below `max_oid`.
    ///
    /// # Panics
    ///
    /// Panics if `owners` is empty.
    pub fn new(owners: Vec<NodeId>, max_oid: u64) -> Self {
        assert!(!owners.is_empty(), "runner needs at least one owner");
        Self {
            owners,
            ttids: Vec::new(),
            max_oid,
            // above every generated serial
            next_tid: 1_000,
            report: RunReport::default(),
        }
    }

    /// Returns every ttid registered so far, tracked or not.
    pub fn ttids(&self) -> &[Ttid] {
        &self.ttids
    }

    fn pick(&self, index: usize) -> Option<Ttid> {
        if self.ttids.is_empty() {
            None
        } else {
            Some(self.ttids[index % self.ttids.len()])
        }
    }

    /// Applies one operation.
    pub fn apply(&mut self, h: &mut TestManager, op: &Op) {
        match op {
            Op::Register { owner } => {
                let owner = self.owners[owner % self.owners.len()];
                let ttid = h.begin_for(owner);
                self.ttids.push(ttid);
            }
            Op::Store {
                txn,
                serial,
                revision,
            } => match self.pick(*txn).filter(|ttid| is_unlocked(&h.tm, *ttid)) {
                Some(ttid) => match h.store_object(ttid, *serial, revision.clone()) {
                    Ok(()) => self.report.stored += 1,
                    Err(TxnError::Conflict { .. }) => self.report.conflicts += 1,
                    Err(TxnError::Delayed { .. }) => self.report.delays += 1,
                    Err(err) => panic!("unexpected storage failure: {err}"),
                },
                None => self.report.skipped += 1,
            },
            Op::Lock { txn } => match self.pick(*txn).filter(|ttid| is_unlocked(&h.tm, *ttid)) {
                Some(ttid) => {
                    let oids: Vec<Oid> = h
                        .transaction(ttid)
                        .map(|txn| txn.oids().collect())
                        .unwrap_or_default();
                    let tid = Tid::new(self.next_tid);
                    self.next_tid += 1;
                    if let Err(err) = h.lock(ttid, tid, &oids) {
                        panic!("unexpected storage failure: {err}");
                    }
                    self.report.locked += 1;
                }
                None => self.report.skipped += 1,
            },
            Op::Unlock { txn } => match self.pick(*txn).filter(|ttid| is_locked(&h.tm, *ttid)) {
                Some(ttid) => {
                    if let Err(err) = h.unlock(ttid) {
                        panic!("unexpected storage failure: {err}");
                    }
                    self.report.unlocked += 1;
                }
                None => self.report.skipped += 1,
            },
            Op::Abort {
                txn,
                even_if_locked,
            } => match self.pick(*txn).filter(|ttid| h.contains(*ttid)) {
                Some(ttid) => {
                    if h.abort(ttid, *even_if_locked) {
                        self.report.aborted += 1;
                    }
                }
                None => self.report.skipped += 1,
            },
            Op::AbortFor { owner } => {
                let owner = self.owners[owner % self.owners.len()];
                self.report.aborted += h.abort_for(owner);
            }
        }
    }

    /// Applies every operation, checking invariants after each step.
    pub fn run(&mut self, h: &mut TestManager, ops: &[Op]) {
        for op in ops {
            self.apply(h, op);
            check_lock_table(&h.tm, &self.ttids, self.max_oid);
        }
    }
}

fn is_unlocked(tm: &TransactionManager, ttid: Ttid) -> bool {
    tm.transaction(ttid).is_some_and(|txn| !txn.is_locked())
}

fn is_locked(tm: &TransactionManager, ttid: Ttid) -> bool {
    tm.transaction(ttid).is_some_and(|txn| txn.is_locked())
}

/// Asserts that the lock table agrees with the tracked transactions.
///
/// Checks, for every oid below `max_oid`:
/// - at most one tracked transaction holds a revision of it
/// - the lock entry names exactly that transaction
/// - the entry is locked exactly when its holder is locked
///
/// and that no entry names a transaction that is no longer tracked.
pub fn check_lock_table(tm: &TransactionManager, ttids: &[Ttid], max_oid: u64) {
    for oid in (0..max_oid).map(Oid::new) {
        let holders: Vec<Ttid> = ttids
            .iter()
            .copied()
            .filter(|ttid| tm.object_from_transaction(*ttid, oid).is_some())
            .collect();
        assert!(holders.len() <= 1, "{oid} held by {holders:?}");

        match (tm.lock_entry(oid), holders.first()) {
            (None, None) => {}
            (Some(entry), Some(&holder)) => {
                assert_eq!(entry.ttid, holder, "{oid} entry names the wrong holder");
                let txn = tm.transaction(holder).unwrap_or_else(|| panic!("{holder} vanished"));
                assert_eq!(entry.locked, txn.is_locked(), "{oid} lock flag out of sync");
            }
            (Some(entry), None) => {
                // only locks taken through the oid list carry no revision
                let txn = tm
                    .transaction(entry.ttid)
                    .unwrap_or_else(|| panic!("{oid} locked by untracked {}", entry.ttid));
                assert!(entry.locked && txn.is_locked(), "{oid} held without a revision");
            }
            (None, Some(holder)) => panic!("{holder} holds {oid} without a lock entry"),
        }
    }
}
