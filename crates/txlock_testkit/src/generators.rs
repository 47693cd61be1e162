//! Property-based test generators using proptest.
//!
//! Provides strategies for identifiers, revisions and whole sequences of
//! manager operations.

use proptest::prelude::*;
use txlock_core::{NodeId, ObjectRevision, Oid, Serial, Tid};

/// Strategy for oids drawn from a small range, so transactions collide.
pub fn oid_strategy(max_oid: u64) -> impl Strategy<Value = Oid> {
    (0..max_oid.max(1)).prop_map(Oid::new)
}

/// Strategy for the serial a write is based on.
pub fn serial_strategy() -> impl Strategy<Value = Serial> {
    (0u64..64).prop_map(Tid::new)
}

/// Strategy for node ids.
pub fn node_id_strategy() -> impl Strategy<Value = NodeId> {
    any::<[u8; 16]>().prop_map(NodeId::from_bytes)
}

/// Strategy for object payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for inline revisions of oids below `max_oid`.
pub fn revision_strategy(max_oid: u64) -> impl Strategy<Value = ObjectRevision> {
    (oid_strategy(max_oid), payload_strategy())
        .prop_map(|(oid, data)| ObjectRevision::inline(oid, data))
}

/// One step applied to a manager by [`OpRunner`](crate::OpRunner).
///
/// Transactions and owners are picked by index, modulo the number that
/// exist when the step runs.
#[derive(Debug, Clone)]
pub enum Op {
    /// Registers a new transaction.
    Register {
        /// Owner index.
        owner: usize,
    },
    /// Stores a revision.
    Store {
        /// Transaction index.
        txn: usize,
        /// Serial the write is based on.
        serial: Serial,
        /// Revision to store.
        revision: ObjectRevision,
    },
    /// Locks a transaction over the objects it holds.
    Lock {
        /// Transaction index.
        txn: usize,
    },
    /// Unlocks a locked transaction.
    Unlock {
        /// Transaction index.
        txn: usize,
    },
    /// Aborts a transaction.
    Abort {
        /// Transaction index.
        txn: usize,
        /// Whether a locked transaction is aborted too.
        even_if_locked: bool,
    },
    /// Aborts the unlocked transactions of an owner.
    AbortFor {
        /// Owner index.
        owner: usize,
    },
}

/// Strategy for a single operation touching oids below `max_oid`.
pub fn op_strategy(max_oid: u64) -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => any::<usize>().prop_map(|owner| Op::Register { owner }),
        6 => (any::<usize>(), serial_strategy(), revision_strategy(max_oid))
            .prop_map(|(txn, serial, revision)| Op::Store { txn, serial, revision }),
        2 => any::<usize>().prop_map(|txn| Op::Lock { txn }),
        2 => any::<usize>().prop_map(|txn| Op::Unlock { txn }),
        2 => (any::<usize>(), any::<bool>())
            .prop_map(|(txn, even_if_locked)| Op::Abort { txn, even_if_locked }),
        1 => any::<usize>().prop_map(|owner| Op::AbortFor { owner }),
    ]
}

/// Strategy for operation sequences of up to `max_len` steps.
pub fn ops_strategy(max_oid: u64, max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(max_oid), 0..max_len)
}
