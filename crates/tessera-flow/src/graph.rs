//! Statically typed transform graph.
//!
//! The build pipeline is assembled as a value: each stage is declared
//! with explicit input/output record types and composed by an ordinary
//! function (see the orchestrator's `assemble_graph`), then executed to
//! completion at a single join point. There is no runtime type
//! discovery and no dynamic topology; the pipeline shape is fixed at
//! compile time.
//!
//! Two stage kinds exist:
//!
//! - [`Transform`]: a pure per-record function fanned out across a
//!   worker pool. Workers complete in arbitrary order, so transforms
//!   must be order-independent functions of their input record.
//! - [`Aggregate`]: a whole-batch function run exactly once (the tree
//!   construction step, which needs every leaf at once).
//!
//! Any stage failure aborts the whole graph; the error names the stage.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::TryStreamExt;
use tokio::task::JoinSet;

use tessera_core::{Entry, EntryRange, Leaf, Revision, Tile, TileRow, TileStore};

use crate::error::{Error, Result};

/// Wraps a stage failure so the error names the stage, leaving errors
/// that already carry a stage name untouched.
fn stage_error(stage: &str, err: Error) -> Error {
    match err {
        already @ Error::Build { .. } => already,
        other => Error::build(stage, other.to_string()),
    }
}

/// A named, data-parallel transform from `I` records to `O` records.
///
/// The function must be pure and order-independent: it may be invoked
/// from many workers concurrently and the output order is unspecified.
pub struct Transform<I, O> {
    name: &'static str,
    func: Arc<dyn Fn(I) -> Result<O> + Send + Sync>,
}

impl<I, O> Clone for Transform<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            func: Arc::clone(&self.func),
        }
    }
}

impl<I, O> std::fmt::Debug for Transform<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}

impl<I, O> Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Declares a transform stage.
    pub fn new(name: &'static str, func: impl Fn(I) -> Result<O> + Send + Sync + 'static) -> Self {
        Self {
            name,
            func: Arc::new(func),
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Applies the transform across `workers` concurrent tasks.
    ///
    /// Output order is unspecified. The whole application fails on the
    /// first record the function rejects.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` naming this stage if the function fails
    /// on any record or a worker panics.
    pub async fn apply(&self, mut input: Vec<I>, workers: usize) -> Result<Vec<O>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let chunk_size = input.len().div_ceil(workers.max(1));
        let mut set: JoinSet<Result<Vec<O>>> = JoinSet::new();
        while !input.is_empty() {
            let rest = input.split_off(chunk_size.min(input.len()));
            let chunk = std::mem::replace(&mut input, rest);
            let func = Arc::clone(&self.func);
            set.spawn(async move { chunk.into_iter().map(|record| func(record)).collect() });
        }

        let mut output = Vec::new();
        while let Some(joined) = set.join_next().await {
            let produced = joined
                .map_err(|e| Error::build(self.name, format!("worker panicked: {e}")))?
                .map_err(|e| stage_error(self.name, e))?;
            output.extend(produced);
        }
        Ok(output)
    }
}

/// A named, whole-batch stage run exactly once.
pub struct Aggregate<I, O> {
    name: &'static str,
    func: Box<dyn FnOnce(I) -> Result<O> + Send>,
}

impl<I, O> std::fmt::Debug for Aggregate<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate").field("name", &self.name).finish()
    }
}

impl<I, O> Aggregate<I, O> {
    /// Declares an aggregate stage.
    pub fn new(name: &'static str, func: impl FnOnce(I) -> Result<O> + Send + 'static) -> Self {
        Self {
            name,
            func: Box::new(func),
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Runs the stage.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` naming this stage on failure.
    pub fn run(self, input: I) -> Result<O> {
        (self.func)(input).map_err(|e| stage_error(self.name, e))
    }
}

/// Counters produced by one graph execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStats {
    /// Entries read from the source.
    pub entry_count: u64,
    /// Leaves fed into the tree stage (including version-history leaves).
    pub leaf_count: u64,
    /// Tiles produced by the tree stage.
    pub tile_count: u64,
    /// Tile rows written to the sink.
    pub rows_written: u64,
}

/// The assembled build pipeline, ready to execute.
///
/// Stages, in order: source → leaf derivation (optionally flattened
/// with the version-history stream) → tree construction (seeded with
/// the prior revision's decoded tiles when updating) → row
/// serialization → batched sink writes. Execution is the single
/// synchronous join point the orchestrator blocks on; the commit that
/// makes the revision visible happens outside the graph, afterwards.
pub struct BuildGraph {
    pub(crate) revision: Revision,
    pub(crate) range: EntryRange,
    pub(crate) source: BoxStream<'static, tessera_core::Result<Entry>>,
    pub(crate) entry_to_leaf: Transform<Entry, Leaf>,
    pub(crate) history: Option<Aggregate<Vec<Entry>, Vec<Leaf>>>,
    /// Prior revision's rows plus the decode stage; `None` for a full
    /// rebuild.
    pub(crate) prior: Option<(Vec<TileRow>, Transform<TileRow, Tile>)>,
    pub(crate) tree: Aggregate<(Vec<Tile>, Vec<Leaf>), Vec<Tile>>,
    pub(crate) tile_to_row: Transform<Tile, TileRow>,
    pub(crate) sink: Arc<dyn TileStore>,
    pub(crate) write_batch_size: usize,
    pub(crate) workers: usize,
}

impl std::fmt::Debug for BuildGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildGraph")
            .field("revision", &self.revision)
            .field("range", &self.range)
            .field("incremental", &self.prior.is_some())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl BuildGraph {
    /// Executes the graph to completion.
    ///
    /// On failure nothing is committed; rows already written for this
    /// revision are orphaned and harmless because the revision is never
    /// finalized.
    ///
    /// # Errors
    ///
    /// Returns `Error::Build` if any stage fails, or the underlying
    /// store error if a sink write fails.
    pub async fn execute(self) -> Result<GraphStats> {
        let mut stats = GraphStats::default();

        let entries: Vec<Entry> = self
            .source
            .try_collect()
            .await
            .map_err(|e| stage_error("source", e.into()))?;
        stats.entry_count = entries.len() as u64;

        // The history stage consumes the same entry batch the leaf
        // stage does; keep a copy only when it is enabled.
        let history_input = self.history.as_ref().map(|_| entries.clone());

        let mut leaves = self.entry_to_leaf.apply(entries, self.workers).await?;
        if let (Some(history), Some(input)) = (self.history, history_input) {
            // Flatten: a union of the two leaf streams, not a join.
            leaves.extend(history.run(input)?);
        }
        stats.leaf_count = leaves.len() as u64;

        let prior_tiles = match self.prior {
            Some((rows, row_to_tile)) => row_to_tile.apply(rows, self.workers).await?,
            None => Vec::new(),
        };

        let tiles = self.tree.run((prior_tiles, leaves))?;
        stats.tile_count = tiles.len() as u64;

        let rows = self.tile_to_row.apply(tiles, self.workers).await?;
        for batch in rows.chunks(self.write_batch_size) {
            self.sink.write_tiles(self.revision, batch).await?;
        }
        stats.rows_written = rows.len() as u64;

        Ok(stats)
    }
}
