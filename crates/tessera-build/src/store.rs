//! File-backed stores for the command-line builder.
//!
//! Both stores are directories of line-oriented JSON files:
//!
//! - log mirror: `entries.jsonl` (one log entry per line, ordered by
//!   entry ID) and `checkpoint` (the raw checkpoint bytes, written
//!   whole by the mirroring process).
//! - tile store: `tiles.jsonl` and `revisions.jsonl`, both append-only.
//!   A revision becomes visible only once its metadata line lands in
//!   `revisions.jsonl`; tile rows are flushed and synced before that
//!   line is appended, so a crash mid-build leaves orphaned rows but
//!   never a committed revision with missing tiles.
//!
//! Revision numbers are recovered by scanning both files, so a crashed
//! build's orphaned rows still burn their revision number.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use tessera_core::store::{LogMirror, MirrorMetadata, RevisionMetadata, TileStore};
use tessera_core::{Checkpoint, Entry, EntryRange, Error, Result, Revision, TileRow};

const ENTRIES_FILE: &str = "entries.jsonl";
const CHECKPOINT_FILE: &str = "checkpoint";
const TILES_FILE: &str = "tiles.jsonl";
const REVISIONS_FILE: &str = "revisions.jsonl";

fn io_err(context: &str, path: &Path, err: std::io::Error) -> Error {
    Error::storage_with_source(format!("{context} {}", path.display()), err)
}

/// Reads every record from a JSON-lines file; a missing file is empty.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err("failed to open", path, err)),
    };
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| io_err("failed to read", path, err))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|err| {
            Error::serialization(format!(
                "{}: bad record on line {}: {err}",
                path.display(),
                index + 1
            ))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Appends records to a JSON-lines file and syncs it to disk.
fn append_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| io_err("failed to open", path, err))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|err| Error::serialization(format!("failed to encode record: {err}")))?;
        writeln!(writer, "{line}").map_err(|err| io_err("failed to write", path, err))?;
    }
    writer
        .flush()
        .map_err(|err| io_err("failed to flush", path, err))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|err| io_err("failed to sync", path, err))?;
    Ok(())
}

/// A log mirror backed by a directory of files.
///
/// The mirroring process appends entries and replaces the checkpoint;
/// the builder only reads.
#[derive(Debug, Clone)]
pub struct FileLogMirror {
    dir: PathBuf,
}

impl FileLogMirror {
    /// Opens (creating if needed) a mirror directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| io_err("failed to create", &dir, err))?;
        Ok(Self { dir })
    }

    fn entries_path(&self) -> PathBuf {
        self.dir.join(ENTRIES_FILE)
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    fn read_entries(&self) -> Result<Vec<Entry>> {
        let entries: Vec<Entry> = read_jsonl(&self.entries_path())?;
        for (index, entry) in entries.iter().enumerate() {
            if entry.id != index as u64 {
                return Err(Error::storage(format!(
                    "mirror entries are not contiguous: found ID {} at position {index}",
                    entry.id
                )));
            }
        }
        Ok(entries)
    }

    /// Appends one entry, assigning the next sequential ID.
    pub fn append(&self, key: impl Into<String>, payload: impl Into<bytes::Bytes>) -> Result<u64> {
        let id = self.read_entries()?.len() as u64;
        let entry = Entry {
            id,
            key: key.into(),
            payload: payload.into(),
        };
        append_jsonl(&self.entries_path(), std::slice::from_ref(&entry))?;
        Ok(id)
    }

    /// Replaces the published checkpoint.
    pub fn set_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.checkpoint_path();
        fs::write(&path, checkpoint.as_bytes()).map_err(|err| io_err("failed to write", &path, err))
    }
}

#[async_trait]
impl LogMirror for FileLogMirror {
    async fn metadata(&self) -> Result<MirrorMetadata> {
        let total_entries = self.read_entries()?.len() as u64;
        let checkpoint = match fs::read(self.checkpoint_path()) {
            Ok(bytes) => Some(Checkpoint::new(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(io_err("failed to read", &self.checkpoint_path(), err)),
        };
        Ok(MirrorMetadata {
            checkpoint,
            total_entries,
        })
    }

    async fn entries(&self, range: EntryRange) -> Result<BoxStream<'static, Result<Entry>>> {
        let entries = self.read_entries()?;
        if range.end > entries.len() as u64 {
            return Err(Error::storage(format!(
                "mirror holds {} entries, range {range} requested",
                entries.len()
            )));
        }
        let selected: Vec<Result<Entry>> = entries
            .into_iter()
            .filter(|entry| range.contains(entry.id))
            .map(Ok)
            .collect();
        Ok(stream::iter(selected).boxed())
    }
}

/// A tile store backed by a directory of append-only files.
#[derive(Debug, Clone)]
pub struct FileTileStore {
    dir: PathBuf,
}

impl FileTileStore {
    /// Opens (creating if needed) a tile store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| io_err("failed to create", &dir, err))?;
        Ok(Self { dir })
    }

    fn tiles_path(&self) -> PathBuf {
        self.dir.join(TILES_FILE)
    }

    fn revisions_path(&self) -> PathBuf {
        self.dir.join(REVISIONS_FILE)
    }

    fn read_rows(&self) -> Result<Vec<TileRow>> {
        read_jsonl(&self.tiles_path())
    }

    fn read_revisions(&self) -> Result<Vec<RevisionMetadata>> {
        read_jsonl(&self.revisions_path())
    }
}

#[async_trait]
impl TileStore for FileTileStore {
    async fn next_write_revision(&self) -> Result<Revision> {
        // Scan both files so orphaned rows from a crashed build still
        // reserve their revision number.
        let from_rows = self
            .read_rows()?
            .iter()
            .map(|row| row.revision.as_u64())
            .max();
        let from_revisions = self
            .read_revisions()?
            .iter()
            .map(|meta| meta.revision.as_u64())
            .max();
        let next = from_rows
            .into_iter()
            .chain(from_revisions)
            .max()
            .map_or(0, |highest| highest + 1);
        Ok(Revision::new(next))
    }

    async fn latest_revision(&self) -> Result<Option<RevisionMetadata>> {
        Ok(self
            .read_revisions()?
            .into_iter()
            .max_by_key(|meta| meta.revision))
    }

    async fn read_tiles(&self, revision: Revision) -> Result<Vec<TileRow>> {
        // Re-appended rows win over earlier ones at the same path.
        let mut by_path = std::collections::BTreeMap::new();
        for row in self.read_rows()? {
            if row.revision == revision {
                by_path.insert(row.path.clone(), row);
            }
        }
        Ok(by_path.into_values().collect())
    }

    async fn write_tiles(&self, revision: Revision, rows: &[TileRow]) -> Result<()> {
        for row in rows {
            if row.revision != revision {
                return Err(Error::InvalidInput(format!(
                    "tile row for revision {} in batch for revision {revision}",
                    row.revision
                )));
            }
        }
        append_jsonl(&self.tiles_path(), rows)
    }

    async fn commit_revision(
        &self,
        revision: Revision,
        checkpoint: Checkpoint,
        covered_entries: u64,
    ) -> Result<()> {
        let has_rows = self.read_rows()?.iter().any(|row| row.revision == revision);
        if !has_rows {
            return Err(Error::storage(format!(
                "refusing to commit revision {revision}: no tile rows were written for it"
            )));
        }
        if let Some(latest) = self.latest_revision().await? {
            if revision <= latest.revision {
                return Err(Error::storage(format!(
                    "revision {revision} does not advance past committed revision {}",
                    latest.revision
                )));
            }
            if covered_entries < latest.covered_entries {
                return Err(Error::storage(format!(
                    "coverage would regress from {} to {covered_entries} entries",
                    latest.covered_entries
                )));
            }
        }
        let meta = RevisionMetadata {
            revision,
            checkpoint,
            covered_entries,
            committed_at: Utc::now(),
        };
        append_jsonl(&self.revisions_path(), std::slice::from_ref(&meta))
    }
}
