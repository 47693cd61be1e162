//! Transaction state.

use std::collections::HashMap;
use txlock_storage::{NodeId, ObjectRevision, Oid, Tid, TransactionInfo, Ttid};

/// A pending transaction tracked by the lock manager.
///
/// Holds at most one revision per object, in the order objects were first
/// stored. The record itself never talks to storage; the
/// [`TransactionManager`](super::TransactionManager) decides when it may be
/// mutated and freezes it once it is locked.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Node or client that registered the transaction.
    owner: NodeId,
    /// Temporary id, key of the manager's table.
    ttid: Ttid,
    /// Final id, set once when the transaction is locked.
    tid: Option<Tid>,
    /// Stored revisions in first-seen order.
    objects: Vec<ObjectRevision>,
    /// Position of each oid in `objects`.
    positions: HashMap<Oid, usize>,
    /// Metadata from `store_transaction`.
    info: Option<TransactionInfo>,
    locked: bool,
}

impl Transaction {
    /// Creates an empty, unlocked transaction.
    #[must_use]
    pub fn new(owner: NodeId, ttid: Ttid) -> Self {
        Self {
            owner,
            ttid,
            tid: None,
            objects: Vec::new(),
            positions: HashMap::new(),
            info: None,
            locked: false,
        }
    }

    /// Returns the owning node.
    #[must_use]
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Returns the temporary transaction id.
    #[must_use]
    pub fn ttid(&self) -> Ttid {
        self.ttid
    }

    /// Returns the final transaction id, once assigned.
    #[must_use]
    pub fn tid(&self) -> Option<Tid> {
        self.tid
    }

    /// Assigns the final transaction id.
    ///
    /// # Panics
    ///
    /// Panics if a tid was already assigned.
    pub fn set_tid(&mut self, tid: Tid) {
        if let Some(existing) = self.tid {
            panic!("{} already has final {existing}", self.ttid);
        }
        self.tid = Some(tid);
    }

    /// Stores a revision, replacing any earlier one for the same object.
    ///
    /// A replaced revision keeps its original position.
    pub fn add_object(&mut self, revision: ObjectRevision) {
        match self.positions.get(&revision.oid) {
            Some(&index) => self.objects[index] = revision,
            None => {
                self.positions.insert(revision.oid, self.objects.len());
                self.objects.push(revision);
            }
        }
    }

    /// Returns the revision stored for `oid`.
    #[must_use]
    pub fn object(&self, oid: Oid) -> Option<&ObjectRevision> {
        self.positions.get(&oid).map(|&index| &self.objects[index])
    }

    /// Returns all stored revisions in first-seen order.
    #[must_use]
    pub fn object_list(&self) -> &[ObjectRevision] {
        &self.objects
    }

    /// Returns the oids of all stored revisions in first-seen order.
    pub fn oids(&self) -> impl Iterator<Item = Oid> + '_ {
        self.objects.iter().map(|revision| revision.oid)
    }

    /// Returns the number of stored revisions.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Attaches transaction metadata, replacing any earlier metadata.
    pub fn prepare(&mut self, info: TransactionInfo) {
        self.info = Some(info);
    }

    /// Returns the attached metadata.
    #[must_use]
    pub fn info(&self) -> Option<&TransactionInfo> {
        self.info.as_ref()
    }

    /// Marks the transaction locked.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is already locked.
    pub fn lock(&mut self) {
        assert!(!self.locked, "{} is already locked", self.ttid);
        self.locked = true;
    }

    /// Checks if the transaction is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}
