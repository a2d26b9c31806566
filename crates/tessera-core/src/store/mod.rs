//! Capability traits for the log mirror and the revisioned tile store.
//!
//! The orchestrator in `tessera-flow` is written entirely against these
//! traits, which carry exactly the operations the build needs. In-memory
//! implementations live in [`memory`] and are the substitution point for
//! tests; durable backends (the file-backed stores in `tessera-build`, or
//! a relational database) implement the same contracts.
//!
//! ## Visibility contract
//!
//! A revision becomes visible to [`TileStore::latest_revision`] only once
//! [`TileStore::commit_revision`] has recorded its metadata, and that call
//! must come after every tile row of the revision has been durably
//! written. Tiles of a revision whose commit never happened are orphaned,
//! never half-visible.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::Result;
use crate::id::Revision;
use crate::log::{Checkpoint, Entry, EntryRange};
use crate::tile::TileRow;

/// Current state of the log mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorMetadata {
    /// The most recently stored checkpoint, if any.
    ///
    /// An empty mirror has no checkpoint; callers that need to bind a
    /// revision to a checkpoint must treat its absence as fatal.
    pub checkpoint: Option<Checkpoint>,
    /// Total number of entries available in the mirror.
    pub total_entries: u64,
}

/// Metadata of one committed map revision.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RevisionMetadata {
    /// The revision number.
    pub revision: Revision,
    /// The log checkpoint the revision was built against.
    pub checkpoint: Checkpoint,
    /// Total entry count the revision covers (the build range's end ID).
    pub covered_entries: u64,
    /// When the revision was committed.
    pub committed_at: DateTime<Utc>,
}

/// Read-only view over a local copy of the source log.
#[async_trait]
pub trait LogMirror: Send + Sync {
    /// Returns the latest checkpoint and the total entry count.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on I/O failure. An empty mirror is not an
    /// error: it yields zero entries and no checkpoint.
    async fn metadata(&self) -> Result<MirrorMetadata>;

    /// Yields the entries whose IDs fall in `range`, as a lazy stream.
    ///
    /// The stream is finite and order-independent; because the log is
    /// immutable within the range, re-invoking with the same bounds
    /// yields the same set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on I/O failure.
    async fn entries(&self, range: EntryRange) -> Result<BoxStream<'static, Result<Entry>>>;
}

/// Revisioned persistent store of map tiles.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Allocates the next unused revision number.
    ///
    /// The returned number is strictly greater than any number ever
    /// handed out by this store, including numbers consumed by builds
    /// that failed before commit.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on I/O failure.
    async fn next_write_revision(&self) -> Result<Revision>;

    /// Returns the most recently committed revision, or `None` if no
    /// revision has ever been committed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on I/O failure.
    async fn latest_revision(&self) -> Result<Option<RevisionMetadata>>;

    /// Reads back all tile rows of a revision.
    ///
    /// Used to feed a prior revision's tiles into an incremental update.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on I/O failure.
    async fn read_tiles(&self, revision: Revision) -> Result<Vec<TileRow>>;

    /// Bulk-persists a batch of tile rows for `revision`.
    ///
    /// Idempotent at the row level: re-writing the same
    /// `(revision, path)` pair overwrites rather than duplicates.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a row is tagged with a different
    /// revision, `Error::Storage` on I/O failure.
    async fn write_tiles(&self, revision: Revision, rows: &[TileRow]) -> Result<()>;

    /// Records the revision's metadata, making it visible to
    /// [`latest_revision`](TileStore::latest_revision).
    ///
    /// Must be the last write of a successful build.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the revision would violate the
    /// monotonicity invariants (revision number or covered entry count
    /// going backwards) or on I/O failure.
    async fn commit_revision(
        &self,
        revision: Revision,
        checkpoint: Checkpoint,
        covered_entries: u64,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_metadata_models_empty_mirror() {
        let meta = MirrorMetadata {
            checkpoint: None,
            total_entries: 0,
        };
        assert!(meta.checkpoint.is_none());
        assert_eq!(meta.total_entries, 0);
    }

    #[test]
    fn revision_metadata_round_trips_through_json() {
        let meta = RevisionMetadata {
            revision: Revision::new(7),
            checkpoint: Checkpoint::from("cp"),
            covered_entries: 1500,
            committed_at: Utc::now(),
        };
        let encoded = serde_json::to_string(&meta).unwrap();
        let decoded: RevisionMetadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, meta);
    }
}
