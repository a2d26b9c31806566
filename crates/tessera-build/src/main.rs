//! Command-line builder for the tessera verifiable map.
//!
//! One invocation performs one build: it reads the mirrored log under
//! `--log-dir`, constructs (or incrementally updates) the prefix tree,
//! and commits a new revision of tiles under `--tile-dir`. Re-invoke it
//! whenever the mirror has grown.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use tessera_core::{init_logging, LogFormat, TreeId};
use tessera_flow::prelude::*;
use tessera_flow::EntryCap;

use crate::store::{FileLogMirror, FileTileStore};

#[derive(Debug, Parser)]
#[command(
    name = "tessera-build",
    about = "Builds one revision of the verifiable map from a mirrored log",
    version
)]
struct Args {
    /// Directory holding the mirrored log (entries.jsonl and checkpoint).
    #[arg(long, env = "TESSERA_LOG_DIR")]
    log_dir: PathBuf,

    /// Directory holding the tile store (tiles.jsonl and revisions.jsonl).
    #[arg(long, env = "TESSERA_TILE_DIR")]
    tile_dir: PathBuf,

    /// Tree identity; salts all hashing, so changing it changes every
    /// hash in the map.
    #[arg(long, env = "TESSERA_TREE_ID", default_value_t = 12345)]
    tree_id: i64,

    /// Number of byte-prefix strata above the final stratum.
    #[arg(long, env = "TESSERA_PREFIX_STRATA", default_value_t = 2)]
    prefix_strata: usize,

    /// Number of log entries to consume; -1 means all available.
    #[arg(
        long,
        env = "TESSERA_COUNT",
        default_value_t = -1,
        allow_hyphen_values = true
    )]
    count: i64,

    /// Tile rows written per storage batch.
    #[arg(long, env = "TESSERA_WRITE_BATCH_SIZE", default_value_t = 250)]
    write_batch_size: usize,

    /// Update the latest committed revision with new entries instead of
    /// rebuilding from scratch.
    #[arg(long, env = "TESSERA_INCREMENTAL_UPDATE")]
    incremental_update: bool,

    /// Also build the per-key version-history sub-map. Incompatible
    /// with --incremental-update.
    #[arg(long, env = "TESSERA_BUILD_VERSION_HISTORY")]
    build_version_history: bool,

    /// Worker count for the parallel stages; defaults to the number of
    /// available CPUs.
    #[arg(long, env = "TESSERA_WORKERS")]
    workers: Option<usize>,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "TESSERA_LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

impl Args {
    fn log_format(&self) -> anyhow::Result<LogFormat> {
        match self.log_format.as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => bail!("unknown log format '{other}' (expected 'pretty' or 'json')"),
        }
    }

    fn entry_cap(&self) -> anyhow::Result<EntryCap> {
        match self.count {
            -1 => Ok(EntryCap::All),
            n => u64::try_from(n)
                .map(EntryCap::Limit)
                .map_err(|_| anyhow::anyhow!("--count must be -1 (all) or non-negative, got {n}")),
        }
    }

    fn build_config(&self) -> anyhow::Result<BuildConfig> {
        let defaults = BuildConfig::default();
        Ok(BuildConfig {
            tree_id: TreeId::new(self.tree_id),
            prefix_strata: self.prefix_strata,
            entry_cap: self.entry_cap()?,
            write_batch_size: self.write_batch_size,
            incremental: self.incremental_update,
            version_history: self.build_version_history,
            workers: self.workers.unwrap_or(defaults.workers),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format()?);

    let config = args.build_config()?;
    let mirror = FileLogMirror::open(&args.log_dir)
        .with_context(|| format!("opening log mirror at {}", args.log_dir.display()))?;
    let tiles = FileTileStore::open(&args.tile_dir)
        .with_context(|| format!("opening tile store at {}", args.tile_dir.display()))?;

    let orchestrator = BuildOrchestrator::new(
        Arc::new(mirror),
        Arc::new(tiles),
        Arc::new(StrataTreeBuilder::new()),
        config,
    );

    let summary = orchestrator.run().await.context("build failed")?;
    info!(
        revision = summary.revision.as_u64(),
        range = %summary.range,
        tiles = summary.stats.rows_written,
        "build complete"
    );
    Ok(())
}
