//! Identifier types shared by the storage boundary and the lock manager.
//!
//! All identifiers are opaque, totally ordered tokens handed to us by the
//! surrounding protocol layer. Nothing here assigns or compares clocks.

use std::fmt;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Object identifier within the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Oid(pub u64);

impl Oid {
    /// Creates an object ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:{:016x}", self.0)
    }
}

/// Final, globally ordered transaction id.
///
/// A revision of an object is named by the tid of the transaction that
/// wrote it, which is why [`Serial`] is the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tid(pub u64);

impl Tid {
    /// The serial a client supplies when it creates an object.
    pub const ZERO: Tid = Tid(0);

    /// Creates a transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid:{:016x}", self.0)
    }
}

/// Revision identifier a write is based on.
pub type Serial = Tid;

/// Temporary transaction id, assigned before the commit order is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ttid(pub u64);

impl Ttid {
    /// Creates a temporary transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ttid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ttid:{:016x}", self.0)
    }
}

/// Identifier of the node or client that owns a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(Uuid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a node ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a node ID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tid_ordering() {
        assert!(Tid::new(1) < Tid::new(2));
        assert!(Tid::ZERO < Tid::new(1));
    }

    #[test]
    fn display_is_zero_padded_hex() {
        assert_eq!(format!("{}", Oid::new(255)), "oid:00000000000000ff");
        assert_eq!(format!("{}", Ttid::new(1)), "ttid:0000000000000001");
    }

    #[test]
    fn node_ids_are_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
        let bytes = [7u8; 16];
        assert_eq!(NodeId::from_bytes(bytes), NodeId::from_bytes(bytes));
    }

    proptest! {
        #[test]
        fn tid_order_follows_raw_value(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(Tid::new(a).cmp(&Tid::new(b)), a.cmp(&b));
            prop_assert_eq!(Tid::new(a).as_u64(), a);
        }
    }
}
