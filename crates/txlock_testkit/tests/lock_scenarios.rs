//! End-to-end lock manager scenarios across the core and storage crates.

use txlock_core::{Checksum, Config, NodeId, Oid, Tid, TransactionManager, TxnError, Ttid};
use txlock_storage::FailPoint;
use txlock_testkit::prelude::*;

const OID_A: u64 = 0xa;
const OID_B: u64 = 0xb;

fn two_writers() -> (TestManager, Ttid, Ttid) {
    init_tracing();
    let mut h = TestManager::new();
    let t1 = h.begin();
    h.store_transaction(t1, info_for(&[OID_A, OID_B]));
    h.store_object(t1, Tid::ZERO, revision(OID_A, b"a1")).unwrap();
    h.store_object(t1, Tid::ZERO, revision(OID_B, b"b1")).unwrap();

    let t2 = h.begin();
    h.store_transaction(t2, info_for(&[OID_A]));
    (h, t1, t2)
}

#[test]
fn write_to_object_held_by_undecided_transaction_is_delayed() {
    let (mut h, t1, t2) = two_writers();

    let err = h.store_object(t2, Tid::ZERO, revision(OID_A, b"a2")).unwrap_err();
    assert!(err.is_delayed());
    assert!(err.is_retryable());
    assert!(matches!(err, TxnError::Delayed { holder, .. } if holder == t1));
}

#[test]
fn write_to_object_locked_by_decided_transaction_conflicts() {
    let (mut h, t1, t2) = two_writers();
    h.lock(t1, Tid::new(1), &[Oid::new(OID_A), Oid::new(OID_B)]).unwrap();

    let err = h.store_object(t2, Tid::ZERO, revision(OID_A, b"a2")).unwrap_err();
    assert!(err.is_conflict());
    assert!(!err.is_retryable());
    assert_eq!(err.oid(), Some(Oid::new(OID_A)));
}

#[test]
fn write_based_on_outdated_serial_conflicts() {
    init_tracing();
    let mut h = TestManager::new();
    h.dm.commit_history(Oid::new(OID_A), Tid::new(1));
    let t1 = h.begin();

    let err = h.store_object(t1, Tid::ZERO, revision(OID_A, b"a1")).unwrap_err();
    assert!(matches!(
        err,
        TxnError::Conflict { newer_serial: Some(serial), .. } if serial == Tid::new(1)
    ));
}

#[test]
fn full_round_trip_persists_once_and_finishes_once() {
    let (mut h, t1, _t2) = two_writers();
    h.store_object(t1, Tid::ZERO, revision(OID_A, b"a1-final")).unwrap();

    h.lock(t1, Tid::new(7), &[Oid::new(OID_A), Oid::new(OID_B)]).unwrap();
    h.unlock(t1).unwrap();

    let stored = h.dm.stored_transactions();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].tid, Tid::new(7));
    assert_eq!(
        stored[0].objects,
        vec![revision(OID_A, b"a1-final"), revision(OID_B, b"b1")]
    );
    assert_eq!(stored[0].info, Some(info_for(&[OID_A, OID_B])));
    assert_eq!(h.dm.finished(), vec![Tid::new(7)]);
    assert!(!h.contains(t1));
}

#[test]
fn delayed_write_is_redriven_after_commit_and_then_conflicts() {
    let (mut h, t1, t2) = two_writers();
    assert!(!h.store_or_defer(t2, Tid::ZERO, revision(OID_A, b"a2")).unwrap());

    h.lock(t1, Tid::new(7), &[Oid::new(OID_A), Oid::new(OID_B)]).unwrap();
    // locking frees nothing
    assert!(h.redrive().is_empty());

    h.unlock(t1).unwrap();
    let outcomes = h.redrive();
    assert_eq!(outcomes.len(), 1);
    // the retried write was based on a serial that is now outdated
    assert!(matches!(&outcomes[0], Err(err) if err.is_conflict()));
}

#[test]
fn delayed_write_is_redriven_after_abort_and_succeeds() {
    let (mut h, t1, t2) = two_writers();
    assert!(!h.store_or_defer(t2, Tid::ZERO, revision(OID_A, b"a2")).unwrap());

    assert!(h.abort(t1, false));
    let outcomes = h.redrive();
    assert!(matches!(outcomes.as_slice(), [Ok(true)]));
    assert_eq!(h.locking_ttid(Oid::new(OID_A)), Some(t2));
}

#[test]
fn redrive_drops_stores_of_aborted_transactions() {
    let (mut h, t1, t2) = two_writers();
    assert!(!h.store_or_defer(t2, Tid::ZERO, revision(OID_A, b"a2")).unwrap());

    h.abort(t2, false);
    h.abort(t1, false);
    assert!(h.redrive().is_empty());
}

#[test]
fn waiter_is_released_when_holder_commits() {
    let (mut h, t1, _t2) = two_writers();
    let mut waiter = h.wait_for(Oid::new(OID_A));
    assert!(!waiter.is_released());

    h.commit(t1, Tid::new(3)).unwrap();
    assert!(waiter.is_released());
    waiter.wait();
}

#[test]
fn disconnecting_node_loses_only_undecided_transactions() {
    init_tracing();
    let mut h = TestManager::new();
    let client = NodeId::new();
    let decided = h.begin_for(client);
    let undecided = h.begin_for(client);
    let bystander = h.begin();
    h.store_object(decided, Tid::ZERO, revision(1, b"x")).unwrap();
    h.store_object(undecided, Tid::ZERO, revision(2, b"y")).unwrap();
    h.store_object(bystander, Tid::ZERO, revision(3, b"z")).unwrap();
    h.lock(decided, Tid::new(5), &[Oid::new(1)]).unwrap();

    assert_eq!(h.abort_for(client), 1);

    assert!(h.contains(decided));
    assert!(!h.contains(undecided));
    assert!(h.contains(bystander));
    assert!(h.load_locked(Oid::new(1)));
    assert!(h.locking_ttid(Oid::new(2)).is_none());
    assert_eq!(h.executor.calls(), 1);

    // a stale abort for the decided transaction is ignored
    assert!(!h.abort(decided, false));
    h.unlock(decided).unwrap();
}

#[test]
fn stale_abort_after_commit_can_be_tolerated() {
    init_tracing();
    let mut h = TestManager::with_config(Config::new().ignore_unknown_abort(true));
    let t1 = h.begin();
    h.commit(t1, Tid::new(1)).unwrap();

    assert!(!h.abort(t1, false));
    assert_eq!(h.stats().aborted, 0);
}

#[test]
fn storage_failure_during_lock_can_be_retried() {
    let (mut h, t1, t2) = two_writers();
    h.dm.fail_next(FailPoint::Store);

    let oids = [Oid::new(OID_A), Oid::new(OID_B)];
    let err = h.lock(t1, Tid::new(9), &oids).unwrap_err();
    assert!(matches!(err, TxnError::Storage(_)));
    // still undecided, so others are delayed rather than rejected
    assert!(h.store_object(t2, Tid::ZERO, revision(OID_A, b"a2")).unwrap_err().is_delayed());

    h.lock(t1, Tid::new(9), &oids).unwrap();
    h.unlock(t1).unwrap();
    assert_eq!(h.dm.finished(), vec![Tid::new(9)]);
}

#[test]
fn pack_rewrites_pending_indirections() {
    init_tracing();
    let mut h = TestManager::new();
    let moved = h.begin();
    let dropped = h.begin();
    h.store_object(moved, Tid::new(3), indirect_revision(1, 3)).unwrap();
    h.store_object(dropped, Tid::new(3), indirect_revision(2, 3)).unwrap();

    let moved_ok = h
        .update_object_data_for_pack(Oid::new(1), Tid::new(3), Some(Tid::new(8)), || {
            panic!("payload must not be fetched")
        })
        .unwrap();
    let dropped_ok = h
        .update_object_data_for_pack(Oid::new(2), Tid::new(3), None, || {
            Ok((false, Checksum::of(b"payload"), b"payload".to_vec()))
        })
        .unwrap();

    assert!(moved_ok && dropped_ok);
    assert_eq!(
        h.object_from_transaction(moved, Oid::new(1)).unwrap().data_serial,
        Some(Tid::new(8))
    );
    let materialized = h.object_from_transaction(dropped, Oid::new(2)).unwrap();
    assert!(!materialized.is_indirect());
    assert_eq!(materialized.data.as_deref(), Some(&b"payload"[..]));

    // the rewritten revisions are what gets persisted
    h.commit(dropped, Tid::new(20)).unwrap();
    let stored = h.dm.stored(Tid::new(20)).unwrap();
    assert_eq!(stored.objects[0].data.as_deref(), Some(&b"payload"[..]));
}

#[test]
fn reset_forgets_everything() {
    let (mut h, t1, _t2) = two_writers();
    h.lock(t1, Tid::new(1), &[Oid::new(OID_A), Oid::new(OID_B)]).unwrap();
    h.reset();

    assert!(h.is_empty());
    assert!(!h.load_locked(Oid::new(OID_A)));
    assert_eq!(h.stats().registered, 2);
    assert_eq!(h.stats().in_flight(), 0);

    h.begin();
    assert_eq!(h.stats().in_flight(), h.len() as u64);
}

#[test]
fn manager_debug_is_compact() {
    let (h, _, _) = two_writers();
    let tm: &TransactionManager = &h;
    let text = format!("{tm:?}");
    assert!(text.starts_with("TransactionManager"));
    assert!(text.contains("transactions: 2"));
}
