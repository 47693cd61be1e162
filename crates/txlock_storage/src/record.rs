//! Records handed across the storage boundary.

use crate::types::{Oid, Serial};
use sha2::{Digest, Sha256};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Content checksum of an object payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    /// Computes the SHA-256 checksum of `data`.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({self})")
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 8 bytes are plenty to tell revisions apart in logs
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// One stored revision of an object inside a pending transaction.
///
/// A revision either carries its payload inline (`data`), or points at the
/// payload of an existing revision through `data_serial`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectRevision {
    /// Object this revision belongs to.
    pub oid: Oid,
    /// Whether `data` is compressed.
    pub compression: bool,
    /// Checksum of the uncompressed payload.
    pub checksum: Checksum,
    /// Inline payload, if any.
    pub data: Option<Vec<u8>>,
    /// Revision whose payload this one reuses, if any.
    pub data_serial: Option<Serial>,
}

impl ObjectRevision {
    /// Creates a revision from its raw parts.
    #[must_use]
    pub fn new(
        oid: Oid,
        compression: bool,
        checksum: Checksum,
        data: Option<Vec<u8>>,
        data_serial: Option<Serial>,
    ) -> Self {
        Self {
            oid,
            compression,
            checksum,
            data,
            data_serial,
        }
    }

    /// Creates an uncompressed inline revision, computing its checksum.
    #[must_use]
    pub fn inline(oid: Oid, data: Vec<u8>) -> Self {
        let checksum = Checksum::of(&data);
        Self::new(oid, false, checksum, Some(data), None)
    }

    /// Creates a revision that reuses the payload stored at `data_serial`.
    #[must_use]
    pub fn indirect(oid: Oid, checksum: Checksum, data_serial: Serial) -> Self {
        Self::new(oid, false, checksum, None, Some(data_serial))
    }

    /// Returns true if the payload lives in another revision.
    #[must_use]
    pub fn is_indirect(&self) -> bool {
        self.data_serial.is_some()
    }
}

/// Metadata attached to a transaction before it is locked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransactionInfo {
    /// Every object the transaction modifies.
    pub oid_list: Vec<Oid>,
    /// User name recorded with the commit.
    pub user: String,
    /// Free-form commit description.
    pub description: String,
    /// Opaque application extension data.
    pub extension: Vec<u8>,
    /// Whether the transaction has already been packed.
    pub is_packed: bool,
}

impl TransactionInfo {
    /// Creates transaction metadata.
    #[must_use]
    pub fn new(
        oid_list: Vec<Oid>,
        user: impl Into<String>,
        description: impl Into<String>,
        extension: Vec<u8>,
        is_packed: bool,
    ) -> Self {
        Self {
            oid_list,
            user: user.into(),
            description: description.into(),
            extension,
            is_packed,
        }
    }
}
