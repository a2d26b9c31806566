//! Strongly-typed identifiers for tessera entities.
//!
//! Unlike identifiers that are generated without coordination, the
//! identifiers here are sequential values handed out by a store
//! (`Revision`) or chosen by the operator (`TreeId`). Newtypes keep them
//! from being mixed up at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A map revision number.
///
/// Revisions are monotonically increasing integers allocated by the tile
/// store. A revision identifies one complete, immutable snapshot of the
/// map. Revision numbers are never reused, even when a build is aborted
/// before commit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Creates a revision from a raw number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying revision number.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the revision that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The identity of a map tree.
///
/// The tree ID salts all hashing so that distinct trees sharing a store
/// produce unrelated digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(i64);

impl TreeId {
    /// Creates a tree ID from a raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns the ID as little-endian bytes for use as a hash salt.
    #[must_use]
    pub const fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TreeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
