//! Observability metrics for map builds.
//!
//! Exposed via the `metrics` crate facade; install any compatible
//! recorder (e.g. a Prometheus exporter) in the binary to export them.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tessera_builds_total` | Counter | `mode`, `outcome` | Build invocations by mode and outcome |
//! | `tessera_build_duration_seconds` | Histogram | `mode` | Wall-clock duration of committed builds |
//! | `tessera_entries_processed_total` | Counter | - | Log entries consumed across builds |
//! | `tessera_leaves_processed_total` | Counter | - | Map leaves fed to the tree stage |
//! | `tessera_tiles_written_total` | Counter | - | Tile rows persisted to the sink |

use std::time::Duration;

use metrics::{counter, histogram};

use crate::graph::GraphStats;

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Build invocations by mode and outcome.
    pub const BUILDS_TOTAL: &str = "tessera_builds_total";
    /// Histogram: Wall-clock duration of committed builds in seconds.
    pub const BUILD_DURATION_SECONDS: &str = "tessera_build_duration_seconds";
    /// Counter: Log entries consumed across builds.
    pub const ENTRIES_PROCESSED_TOTAL: &str = "tessera_entries_processed_total";
    /// Counter: Map leaves fed to the tree stage.
    pub const LEAVES_PROCESSED_TOTAL: &str = "tessera_leaves_processed_total";
    /// Counter: Tile rows persisted to the sink.
    pub const TILES_WRITTEN_TOTAL: &str = "tessera_tiles_written_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Build mode (full, incremental).
    pub const MODE: &str = "mode";
    /// Build outcome (committed, failed).
    pub const OUTCOME: &str = "outcome";
}

/// High-level interface for recording build metrics.
///
/// Cheap to clone and share.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildMetrics;

impl BuildMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a committed build with its duration and graph counters.
    pub fn record_commit(&self, mode: &str, duration: Duration, stats: &GraphStats) {
        counter!(
            names::BUILDS_TOTAL,
            labels::MODE => mode.to_string(),
            labels::OUTCOME => "committed".to_string(),
        )
        .increment(1);
        histogram!(
            names::BUILD_DURATION_SECONDS,
            labels::MODE => mode.to_string(),
        )
        .record(duration.as_secs_f64());
        counter!(names::ENTRIES_PROCESSED_TOTAL).increment(stats.entry_count);
        counter!(names::LEAVES_PROCESSED_TOTAL).increment(stats.leaf_count);
        counter!(names::TILES_WRITTEN_TOTAL).increment(stats.rows_written);
    }

    /// Records a failed build.
    pub fn record_failure(&self, mode: &str) {
        counter!(
            names::BUILDS_TOTAL,
            labels::MODE => mode.to_string(),
            labels::OUTCOME => "failed".to_string(),
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_is_a_noop() {
        let metrics = BuildMetrics::new();
        metrics.record_commit("full", Duration::from_secs(1), &GraphStats::default());
        metrics.record_failure("incremental");
    }
}
