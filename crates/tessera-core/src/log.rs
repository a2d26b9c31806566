//! Source log primitives: entries, checkpoints, and entry ranges.
//!
//! The source log is append-only. Entries are addressed by a
//! monotonically increasing integer ID and are immutable once logged,
//! which is what makes an entry range restartable: re-reading the same
//! bounds always yields the same set.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, signed commitment to the log's current size and content.
///
/// The checkpoint is attached to a map revision as provenance; it is
/// never parsed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(Bytes);

impl Checkpoint {
    /// Creates a checkpoint from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw checkpoint bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the checkpoint size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the checkpoint is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Checkpoint {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

/// One source-log record.
///
/// Carries a key and associated payload from which a map leaf is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Monotonically increasing log position.
    pub id: u64,
    /// The key this entry commits to.
    pub key: String,
    /// Opaque payload associated with the key.
    pub payload: Bytes,
}

impl Entry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(id: u64, key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            key: key.into(),
            payload: payload.into(),
        }
    }
}

/// A half-open range `[start, end)` over entry IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRange {
    /// Inclusive start ID.
    pub start: u64,
    /// Exclusive end ID.
    pub end: u64,
}

impl EntryRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Returns the number of entry IDs covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the range covers no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns true if the ID falls inside the range.
    #[must_use]
    pub const fn contains(&self, id: u64) -> bool {
        id >= self.start && id < self.end
    }
}

impl fmt::Display for EntryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_len_and_contains() {
        let range = EntryRange::new(10, 15);
        assert_eq!(range.len(), 5);
        assert!(range.contains(10));
        assert!(range.contains(14));
        assert!(!range.contains(15));
        assert!(!range.contains(9));
    }

    #[test]
    fn empty_range() {
        assert!(EntryRange::new(5, 5).is_empty());
        assert_eq!(EntryRange::new(5, 5).len(), 0);
        assert!(!EntryRange::new(0, 1).is_empty());
    }

    #[test]
    fn range_display_is_half_open() {
        assert_eq!(EntryRange::new(0, 1000).to_string(), "[0, 1000)");
    }

    #[test]
    fn checkpoint_is_opaque_bytes() {
        let cp = Checkpoint::from("signed note v1");
        assert_eq!(cp.as_bytes(), b"signed note v1");
        assert!(!cp.is_empty());
    }
}
