//! Lock manager statistics.
//!
//! Counters only ever grow; `TransactionManager::reset` leaves them alone so
//! a node can still report what happened before a reinitialization.
//!
//! # Usage
//!
//! ```rust,ignore
//! let stats = manager.stats();
//! println!("conflicts: {}", stats.conflicts);
//! println!("delays: {}", stats.delays);
//! ```

/// Snapshot of lock manager counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Transactions registered.
    pub registered: u64,
    /// Object revisions accepted by `store_object`.
    pub stored_objects: u64,
    /// Writes rejected as stale.
    pub conflicts: u64,
    /// Writes told to wait for another transaction.
    pub delays: u64,
    /// Transactions locked with a final tid.
    pub locked: u64,
    /// Transactions unlocked after a successful finish.
    pub committed: u64,
    /// Transactions discarded by an abort.
    pub aborted: u64,
    /// Pending revisions rewritten by pack.
    pub pack_rewrites: u64,
    /// Parked waiters released because their object was freed.
    pub waiters_released: u64,
    /// Transactions dropped by a reset.
    pub dropped: u64,
}

impl ManagerStats {
    /// Returns the number of transactions not yet committed, aborted or
    /// dropped by a reset.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.registered
            .saturating_sub(self.committed)
            .saturating_sub(self.aborted)
            .saturating_sub(self.dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_counts_unfinished() {
        let stats = ManagerStats {
            registered: 5,
            committed: 2,
            aborted: 1,
            ..ManagerStats::default()
        };
        assert_eq!(stats.in_flight(), 2);
    }

    #[test]
    fn in_flight_excludes_dropped() {
        let stats = ManagerStats {
            registered: 4,
            committed: 1,
            dropped: 3,
            ..ManagerStats::default()
        };
        assert_eq!(stats.in_flight(), 0);
    }
}
