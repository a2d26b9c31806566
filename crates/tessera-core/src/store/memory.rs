//! In-memory store implementations for testing.
//!
//! This module provides [`MemoryLogMirror`] and [`MemoryTileStore`],
//! simple in-memory implementations of the capability traits suitable
//! for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability
//! - **Single-process only**: State is not shared across process boundaries
//! - **No persistence**: All state is lost when the process exits

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};

use super::{LogMirror, MirrorMetadata, RevisionMetadata, TileStore};
use crate::error::{Error, Result};
use crate::id::Revision;
use crate::log::{Checkpoint, Entry, EntryRange};
use crate::tile::TileRow;

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

/// In-memory log mirror for testing.
///
/// Entries are appended with sequential IDs; the checkpoint is replaced
/// wholesale, mimicking a mirror that stores the latest checkpoint row.
///
/// ## Example
///
/// ```rust
/// use tessera_core::store::memory::MemoryLogMirror;
///
/// let mirror = MemoryLogMirror::new();
/// mirror.append("golang.org/x/text@v0.3.0", b"h1:abc".to_vec()).unwrap();
/// mirror.set_checkpoint("CP1".into()).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct MemoryLogMirror {
    entries: RwLock<Vec<Entry>>,
    checkpoint: RwLock<Option<Checkpoint>>,
}

impl MemoryLogMirror {
    /// Creates a new, empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry, assigning the next sequential ID.
    ///
    /// Returns the assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn append(&self, key: impl Into<String>, payload: impl Into<bytes::Bytes>) -> Result<u64> {
        let mut entries = self.entries.write().map_err(poison_err)?;
        let id = entries.len() as u64;
        entries.push(Entry::new(id, key, payload));
        Ok(id)
    }

    /// Replaces the stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        *self.checkpoint.write().map_err(poison_err)? = Some(checkpoint);
        Ok(())
    }
}

#[async_trait]
impl LogMirror for MemoryLogMirror {
    async fn metadata(&self) -> Result<MirrorMetadata> {
        let total_entries = self.entries.read().map_err(poison_err)?.len() as u64;
        let checkpoint = self.checkpoint.read().map_err(poison_err)?.clone();
        Ok(MirrorMetadata {
            checkpoint,
            total_entries,
        })
    }

    async fn entries(&self, range: EntryRange) -> Result<BoxStream<'static, Result<Entry>>> {
        let selected: Vec<Entry> = {
            let entries = self.entries.read().map_err(poison_err)?;
            entries
                .iter()
                .filter(|entry| range.contains(entry.id))
                .cloned()
                .collect()
        };
        Ok(stream::iter(selected.into_iter().map(Ok)).boxed())
    }
}

#[derive(Debug, Default)]
struct TileStoreState {
    /// Next revision number to hand out. Only ever increments.
    next_revision: u64,
    /// Tile rows keyed by `(revision, path)` for row-level idempotency.
    rows: BTreeMap<(u64, Vec<u8>), TileRow>,
    /// Committed revision metadata, in commit order.
    revisions: Vec<RevisionMetadata>,
}

/// In-memory tile store for testing.
///
/// Provides a simple, thread-safe implementation of the [`TileStore`]
/// trait using `RwLock` for synchronization. Revision allocation is
/// serialized behind the lock, so allocated numbers are never reused
/// even across concurrent callers.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    state: RwLock<TileStoreState>,
}

impl MemoryTileStore {
    /// Creates a new, empty tile store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tile rows currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn row_count(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poison_err)?.rows.len())
    }

    /// Returns how many revision numbers have been allocated so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn allocated_count(&self) -> Result<u64> {
        Ok(self.state.read().map_err(poison_err)?.next_revision)
    }

    /// Returns the number of committed revisions.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn committed_count(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poison_err)?.revisions.len())
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn next_write_revision(&self) -> Result<Revision> {
        let mut state = self.state.write().map_err(poison_err)?;
        let revision = Revision::new(state.next_revision);
        state.next_revision += 1;
        Ok(revision)
    }

    async fn latest_revision(&self) -> Result<Option<RevisionMetadata>> {
        Ok(self.state.read().map_err(poison_err)?.revisions.last().cloned())
    }

    async fn read_tiles(&self, revision: Revision) -> Result<Vec<TileRow>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .rows
            .range((revision.as_u64(), Vec::new())..(revision.as_u64() + 1, Vec::new()))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn write_tiles(&self, revision: Revision, rows: &[TileRow]) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        for row in rows {
            if row.revision != revision {
                return Err(Error::InvalidInput(format!(
                    "row for revision {} written under revision {revision}",
                    row.revision
                )));
            }
            state
                .rows
                .insert((revision.as_u64(), row.path.clone()), row.clone());
        }
        Ok(())
    }

    async fn commit_revision(
        &self,
        revision: Revision,
        checkpoint: Checkpoint,
        covered_entries: u64,
    ) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if revision.as_u64() >= state.next_revision {
            return Err(Error::storage(format!(
                "revision {revision} was never allocated by this store"
            )));
        }
        if let Some(last) = state.revisions.last() {
            if revision <= last.revision {
                return Err(Error::storage(format!(
                    "revision {revision} does not advance past committed revision {}",
                    last.revision
                )));
            }
            if covered_entries < last.covered_entries {
                return Err(Error::storage(format!(
                    "covered entry count {covered_entries} regresses below {}",
                    last.covered_entries
                )));
            }
        }
        let has_rows = state
            .rows
            .range((revision.as_u64(), Vec::new())..(revision.as_u64() + 1, Vec::new()))
            .next()
            .is_some();
        if !has_rows {
            return Err(Error::storage(format!(
                "refusing to commit revision {revision} with no tile rows"
            )));
        }
        state.revisions.push(RevisionMetadata {
            revision,
            checkpoint,
            covered_entries,
            committed_at: Utc::now(),
        });
        Ok(())
    }
}
