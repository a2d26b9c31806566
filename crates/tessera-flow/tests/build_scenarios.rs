//! End-to-end build scenarios against the in-memory stores.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use tessera_core::store::memory::{MemoryLogMirror, MemoryTileStore};
use tessera_core::store::MirrorMetadata;
use tessera_core::{Checkpoint, Entry, EntryRange, LogMirror, Revision, TileStore};
use tessera_flow::prelude::*;
use tessera_flow::EntryCap;

/// Seeds `count` entries with deterministic keys and payloads, then
/// publishes the given checkpoint.
fn seeded_mirror(count: u64, checkpoint: &str) -> MemoryLogMirror {
    let mirror = MemoryLogMirror::new();
    grow_mirror(&mirror, 0, count, checkpoint);
    mirror
}

fn grow_mirror(mirror: &MemoryLogMirror, from: u64, to: u64, checkpoint: &str) {
    for i in from..to {
        let id = mirror
            .append(format!("module-{i:06}"), format!("payload-{i}").into_bytes())
            .unwrap();
        assert_eq!(id, i);
    }
    mirror.set_checkpoint(Checkpoint::from(checkpoint)).unwrap();
}

fn orchestrator(
    mirror: Arc<dyn LogMirror>,
    tiles: Arc<dyn TileStore>,
    config: BuildConfig,
) -> BuildOrchestrator {
    BuildOrchestrator::new(mirror, tiles, Arc::new(StrataTreeBuilder::new()), config)
}

/// Rows of a committed revision as a sorted, revision-independent set.
async fn committed_rows(store: &MemoryTileStore, revision: Revision) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rows: Vec<(Vec<u8>, Vec<u8>)> = store
        .read_tiles(revision)
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row.path, row.payload))
        .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn full_build_commits_revision_zero() {
    let mirror = Arc::new(seeded_mirror(1000, "CP1"));
    let tiles = Arc::new(MemoryTileStore::new());
    let orchestrator = orchestrator(mirror, Arc::clone(&tiles) as _, BuildConfig::default());

    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.revision, Revision::new(0));
    assert_eq!(summary.range, EntryRange::new(0, 1000));
    assert_eq!(summary.covered_entries, 1000);
    assert_eq!(summary.stats.entry_count, 1000);
    assert_eq!(summary.stats.leaf_count, 1000);
    assert!(summary.stats.rows_written > 0);

    let latest = tiles.latest_revision().await.unwrap().unwrap();
    assert_eq!(latest.revision, Revision::new(0));
    assert_eq!(latest.checkpoint, Checkpoint::from("CP1"));
    assert_eq!(latest.covered_entries, 1000);
}

#[tokio::test]
async fn incremental_build_extends_the_previous_revision() {
    let mirror = Arc::new(seeded_mirror(1000, "CP1"));
    let tiles = Arc::new(MemoryTileStore::new());
    orchestrator(
        Arc::clone(&mirror) as _,
        Arc::clone(&tiles) as _,
        BuildConfig::default(),
    )
    .run()
    .await
    .unwrap();

    // The log grows and publishes a fresh checkpoint.
    grow_mirror(&mirror, 1000, 1500, "CP2");

    let summary = orchestrator(
        Arc::clone(&mirror) as _,
        Arc::clone(&tiles) as _,
        BuildConfig {
            incremental: true,
            ..BuildConfig::default()
        },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.revision, Revision::new(1));
    assert_eq!(summary.range, EntryRange::new(1000, 1500));
    assert_eq!(summary.covered_entries, 1500);
    // Only the delta is read from the mirror.
    assert_eq!(summary.stats.entry_count, 500);

    let latest = tiles.latest_revision().await.unwrap().unwrap();
    assert_eq!(latest.revision, Revision::new(1));
    assert_eq!(latest.checkpoint, Checkpoint::from("CP2"));
    assert_eq!(latest.covered_entries, 1500);
}

#[tokio::test]
async fn incremental_build_matches_a_full_rebuild() {
    let mirror = Arc::new(seeded_mirror(1000, "CP1"));
    let incremental_tiles = Arc::new(MemoryTileStore::new());
    orchestrator(
        Arc::clone(&mirror) as _,
        Arc::clone(&incremental_tiles) as _,
        BuildConfig::default(),
    )
    .run()
    .await
    .unwrap();

    grow_mirror(&mirror, 1000, 1500, "CP2");

    orchestrator(
        Arc::clone(&mirror) as _,
        Arc::clone(&incremental_tiles) as _,
        BuildConfig {
            incremental: true,
            ..BuildConfig::default()
        },
    )
    .run()
    .await
    .unwrap();

    // A from-scratch build over the same 1500 entries must produce an
    // identical tile set.
    let full_tiles = Arc::new(MemoryTileStore::new());
    orchestrator(
        Arc::clone(&mirror) as _,
        Arc::clone(&full_tiles) as _,
        BuildConfig::default(),
    )
    .run()
    .await
    .unwrap();

    let incremental_rows = committed_rows(&incremental_tiles, Revision::new(1)).await;
    let full_rows = committed_rows(&full_tiles, Revision::new(0)).await;
    assert_eq!(incremental_rows, full_rows);
}

#[tokio::test]
async fn incremental_without_prior_revision_touches_nothing() {
    let mirror = Arc::new(seeded_mirror(1000, "CP1"));
    let tiles = Arc::new(MemoryTileStore::new());
    let err = orchestrator(
        mirror,
        Arc::clone(&tiles) as _,
        BuildConfig {
            incremental: true,
            ..BuildConfig::default()
        },
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, tessera_flow::Error::Range { .. }));
    // No revision was allocated and no row was written.
    assert_eq!(tiles.allocated_count().unwrap(), 0);
    assert_eq!(tiles.row_count().unwrap(), 0);
    assert_eq!(tiles.committed_count().unwrap(), 0);
}

#[tokio::test]
async fn cap_beyond_available_entries_fails_before_allocation() {
    let mirror = Arc::new(seeded_mirror(1000, "CP1"));
    let tiles = Arc::new(MemoryTileStore::new());
    let err = orchestrator(
        mirror,
        Arc::clone(&tiles) as _,
        BuildConfig {
            entry_cap: EntryCap::Limit(2000),
            ..BuildConfig::default()
        },
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, tessera_flow::Error::Range { .. }));
    assert_eq!(tiles.allocated_count().unwrap(), 0);
}

#[tokio::test]
async fn capped_full_build_covers_only_the_prefix() {
    let mirror = Arc::new(seeded_mirror(1000, "CP1"));
    let tiles = Arc::new(MemoryTileStore::new());
    let summary = orchestrator(
        mirror,
        tiles,
        BuildConfig {
            entry_cap: EntryCap::Limit(500),
            ..BuildConfig::default()
        },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.range, EntryRange::new(0, 500));
    assert_eq!(summary.stats.entry_count, 500);
    assert_eq!(summary.covered_entries, 500);
}

#[tokio::test]
async fn version_history_adds_one_leaf_per_distinct_key() {
    let mirror = MemoryLogMirror::new();
    // Three modules, five entries: two modules have multiple versions.
    for (key, payload) in [
        ("mod-a", "v1"),
        ("mod-b", "v1"),
        ("mod-a", "v2"),
        ("mod-c", "v1"),
        ("mod-a", "v3"),
    ] {
        mirror.append(key, payload.as_bytes().to_vec()).unwrap();
    }
    mirror.set_checkpoint(Checkpoint::from("CP1")).unwrap();

    let summary = orchestrator(
        Arc::new(mirror),
        Arc::new(MemoryTileStore::new()),
        BuildConfig {
            version_history: true,
            ..BuildConfig::default()
        },
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.stats.entry_count, 5);
    assert_eq!(summary.stats.leaf_count, 5 + 3);
}

/// A mirror whose entry stream fails part-way through.
struct FlakyMirror {
    total: u64,
}

#[async_trait]
impl LogMirror for FlakyMirror {
    async fn metadata(&self) -> tessera_core::Result<MirrorMetadata> {
        Ok(MirrorMetadata {
            checkpoint: Some(Checkpoint::from("CP1")),
            total_entries: self.total,
        })
    }

    async fn entries(
        &self,
        range: EntryRange,
    ) -> tessera_core::Result<BoxStream<'static, tessera_core::Result<Entry>>> {
        let items = (range.start..range.end).map(|id| {
            if id == range.start + 2 {
                Err(tessera_core::Error::storage("mirror read failed"))
            } else {
                Ok(Entry {
                    id,
                    key: format!("module-{id:06}"),
                    payload: format!("payload-{id}").into_bytes().into(),
                })
            }
        });
        Ok(stream::iter(items.collect::<Vec<_>>()).boxed())
    }
}

#[tokio::test]
async fn failed_build_never_commits_and_never_reuses_its_revision() {
    let tiles = Arc::new(MemoryTileStore::new());
    let err = orchestrator(
        Arc::new(FlakyMirror { total: 10 }),
        Arc::clone(&tiles) as _,
        BuildConfig::default(),
    )
    .run()
    .await
    .unwrap_err();

    match err {
        tessera_flow::Error::Build { stage, .. } => assert_eq!(stage, "source"),
        other => panic!("expected build error, got {other}"),
    }
    // Revision 0 was allocated but never committed.
    assert_eq!(tiles.allocated_count().unwrap(), 1);
    assert_eq!(tiles.committed_count().unwrap(), 0);
    assert!(tiles.latest_revision().await.unwrap().is_none());

    // A subsequent successful build gets a fresh revision number.
    let summary = orchestrator(
        Arc::new(seeded_mirror(10, "CP2")),
        Arc::clone(&tiles) as _,
        BuildConfig::default(),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(summary.revision, Revision::new(1));
    assert_eq!(
        tiles.latest_revision().await.unwrap().unwrap().revision,
        Revision::new(1)
    );
}

#[tokio::test]
async fn small_write_batches_still_commit_every_row() {
    let mirror = Arc::new(seeded_mirror(300, "CP1"));
    let tiles = Arc::new(MemoryTileStore::new());
    let summary = orchestrator(
        mirror,
        Arc::clone(&tiles) as _,
        BuildConfig {
            write_batch_size: 7,
            ..BuildConfig::default()
        },
    )
    .run()
    .await
    .unwrap();

    let rows = tiles.read_tiles(summary.revision).await.unwrap();
    assert_eq!(rows.len() as u64, summary.stats.rows_written);
}
