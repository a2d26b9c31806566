//! The build orchestrator.
//!
//! Drives one map build end to end: validate configuration, read the
//! mirror and store state, resolve the entry range and build mode,
//! allocate a revision, assemble the transform graph, execute it, and
//! commit. Every failure is terminal for the invocation; failed builds
//! never commit and their revision number is simply abandoned.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, Instrument};

use tessera_core::observability::build_span;
use tessera_core::{Checkpoint, Entry, EntryRange, LogMirror, Revision, Tile, TileStore};

use crate::config::BuildConfig;
use crate::error::Result;
use crate::graph::{Aggregate, BuildGraph, GraphStats, Transform};
use crate::metrics::BuildMetrics;
use crate::range::{self, BuildMode, ResolvedBuild};
use crate::row;
use crate::tree::TreeBuilder;
use crate::{leaf, leaf::entry_leaf};

/// The outcome of a committed build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// The revision that was committed.
    pub revision: Revision,
    /// The entry range the build consumed.
    pub range: EntryRange,
    /// Total entry count the revision covers.
    pub covered_entries: u64,
    /// The checkpoint the revision is bound to.
    pub checkpoint: Checkpoint,
    /// Counters from the graph execution.
    pub stats: GraphStats,
}

/// Orchestrates map builds against a log mirror and a tile store.
///
/// Single-threaded control code: the graph executes its stages across
/// workers, but the orchestrator itself blocks on completion before
/// committing, so the commit can never race the writes it finalizes.
pub struct BuildOrchestrator {
    mirror: Arc<dyn LogMirror>,
    tiles: Arc<dyn TileStore>,
    builder: Arc<dyn TreeBuilder>,
    config: BuildConfig,
    metrics: BuildMetrics,
}

impl std::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BuildOrchestrator {
    /// Creates an orchestrator over the given capabilities.
    #[must_use]
    pub fn new(
        mirror: Arc<dyn LogMirror>,
        tiles: Arc<dyn TileStore>,
        builder: Arc<dyn TreeBuilder>,
        config: BuildConfig,
    ) -> Self {
        Self {
            mirror,
            tiles,
            builder,
            config,
            metrics: BuildMetrics::new(),
        }
    }

    /// Runs one build to completion.
    ///
    /// # Errors
    ///
    /// - `Error::Config` for contradictory flags, before any I/O.
    /// - `Error::Range` when the requested range cannot be built,
    ///   before any graph construction or store write.
    /// - `Error::Build` when a graph stage fails; the allocated
    ///   revision is abandoned, nothing is committed.
    /// - `Error::Core` for store I/O failures, including a mirror with
    ///   no checkpoint to bind the revision to.
    pub async fn run(&self) -> Result<BuildSummary> {
        self.config.validate()?;

        let meta = self.mirror.metadata().await?;
        let Some(checkpoint) = meta.checkpoint else {
            return Err(tessera_core::Error::storage(
                "log mirror has no checkpoint; a revision cannot be built without one",
            )
            .into());
        };

        let latest = if self.config.incremental {
            self.tiles.latest_revision().await?
        } else {
            None
        };
        let resolved = range::resolve(
            meta.total_entries,
            self.config.entry_cap,
            self.config.incremental,
            latest.as_ref(),
        )?;

        let revision = self.tiles.next_write_revision().await?;
        match resolved.mode {
            BuildMode::Full => info!(
                revision = revision.as_u64(),
                range = %resolved.range,
                "creating new map revision from scratch"
            ),
            BuildMode::Incremental { last_revision } => info!(
                revision = revision.as_u64(),
                last_revision = last_revision.as_u64(),
                range = %resolved.range,
                "updating previous map revision with new entries"
            ),
        }

        let span = build_span(
            revision.as_u64(),
            resolved.mode.label(),
            resolved.range.start,
            resolved.range.end,
        );
        let started = Instant::now();
        let graph = self.assemble_graph(revision, &resolved).await?;
        let stats = match graph.execute().instrument(span).await {
            Ok(stats) => stats,
            Err(err) => {
                self.metrics.record_failure(resolved.mode.label());
                return Err(err);
            }
        };

        // The finalizing write: only now does the revision become
        // visible to readers.
        if let Err(err) = self
            .tiles
            .commit_revision(revision, checkpoint.clone(), resolved.range.end)
            .await
        {
            self.metrics.record_failure(resolved.mode.label());
            return Err(err.into());
        }

        self.metrics
            .record_commit(resolved.mode.label(), started.elapsed(), &stats);
        info!(
            revision = revision.as_u64(),
            covered_entries = resolved.range.end,
            tiles = stats.rows_written,
            "committed map revision"
        );

        Ok(BuildSummary {
            revision,
            range: resolved.range,
            covered_entries: resolved.range.end,
            checkpoint,
            stats,
        })
    }

    /// Assembles the transform graph for one resolved build.
    ///
    /// An ordinary function returning the graph as a value: every stage
    /// is declared here with its concrete input/output types, and the
    /// caller executes the result.
    async fn assemble_graph(
        &self,
        revision: Revision,
        resolved: &ResolvedBuild,
    ) -> Result<BuildGraph> {
        let source = self.mirror.entries(resolved.range).await?;

        let tree_id = self.config.tree_id;
        let entry_to_leaf = Transform::new("entry-to-leaf", move |entry: Entry| {
            Ok(entry_leaf(tree_id, &entry))
        });

        let history = self.config.version_history.then(|| {
            Aggregate::new("version-history", move |entries: Vec<Entry>| {
                Ok(leaf::version_history_leaves(tree_id, &entries))
            })
        });

        let prior = match resolved.mode {
            BuildMode::Full => None,
            BuildMode::Incremental { last_revision } => {
                let rows = self.tiles.read_tiles(last_revision).await?;
                let row_to_tile =
                    Transform::new("tile-from-row", |row_record| row::tile_from_row(&row_record));
                Some((rows, row_to_tile))
            }
        };

        let builder = Arc::clone(&self.builder);
        let prefix_strata = self.config.prefix_strata;
        let incremental = matches!(resolved.mode, BuildMode::Incremental { .. });
        let tree = Aggregate::new("tree", move |(prior_tiles, leaves): (Vec<Tile>, Vec<_>)| {
            if incremental {
                builder.update(&prior_tiles, &leaves, tree_id, prefix_strata)
            } else {
                builder.create(&leaves, tree_id, prefix_strata)
            }
        });

        let tile_to_row = Transform::new("tile-to-row", move |tile: Tile| {
            row::tile_to_row(revision, &tile)
        });

        Ok(BuildGraph {
            revision,
            range: resolved.range,
            source,
            entry_to_leaf,
            history,
            prior,
            tree,
            tile_to_row,
            sink: Arc::clone(&self.tiles),
            write_batch_size: self.config.write_batch_size,
            workers: self.config.workers,
        })
    }
}
