//! Build configuration.
//!
//! Process-wide flag state is deliberately absent: everything a build
//! needs arrives in one explicit [`BuildConfig`] value, validated before
//! any store I/O happens.

use std::fmt;

use tessera_core::TreeId;

use crate::error::{Error, Result};

/// How many log entries the build may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryCap {
    /// Use every entry the mirror has.
    #[default]
    All,
    /// Use exactly the first `n` entries.
    Limit(u64),
}

impl fmt::Display for EntryCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Limit(n) => write!(f, "{n}"),
        }
    }
}

/// Configuration for one build invocation.
///
/// Defaults mirror the conventional operating values: tree ID 12345,
/// two prefix strata, 250-row write batches, full rebuild.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Tree identity; salts all hashing.
    pub tree_id: TreeId,
    /// Number of fixed-width byte-prefix strata before the final stratum.
    pub prefix_strata: usize,
    /// Cap on the number of entries consumed.
    pub entry_cap: EntryCap,
    /// Number of tile rows written per sink batch.
    pub write_batch_size: usize,
    /// Merge the previous revision's tiles with the new entries instead
    /// of rebuilding from scratch.
    pub incremental: bool,
    /// Also attach a per-key version-history sub-map. Incompatible with
    /// incremental mode.
    pub version_history: bool,
    /// Worker count for the data-parallel transform stages.
    pub workers: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tree_id: TreeId::new(12345),
            prefix_strata: 2,
            entry_cap: EntryCap::All,
            write_batch_size: 250,
            incremental: false,
            version_history: false,
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
        }
    }
}

impl BuildConfig {
    /// Validates the configuration.
    ///
    /// Called by the orchestrator before any I/O so that contradictory
    /// flags never reach a store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if incremental mode is combined with the
    /// version-history sub-map, or if a sizing knob is zero or out of
    /// bounds.
    pub fn validate(&self) -> Result<()> {
        if self.incremental && self.version_history {
            return Err(Error::config(
                "version history cannot be combined with incremental updates",
            ));
        }
        if self.write_batch_size == 0 {
            return Err(Error::config("write batch size must be at least 1"));
        }
        if self.workers == 0 {
            return Err(Error::config("worker count must be at least 1"));
        }
        if self.prefix_strata >= tessera_core::tile::LEAF_PATH_LEN {
            return Err(Error::config(format!(
                "prefix strata must be below the leaf path width of {}",
                tessera_core::tile::LEAF_PATH_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BuildConfig::default().validate().unwrap();
    }

    #[test]
    fn incremental_and_version_history_are_mutually_exclusive() {
        let config = BuildConfig {
            incremental: true,
            version_history: true,
            ..BuildConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::Config { .. }
        ));
    }

    #[test]
    fn either_mode_alone_is_fine() {
        let incremental = BuildConfig {
            incremental: true,
            ..BuildConfig::default()
        };
        incremental.validate().unwrap();

        let history = BuildConfig {
            version_history: true,
            ..BuildConfig::default()
        };
        history.validate().unwrap();
    }

    #[test]
    fn zero_sized_knobs_are_rejected() {
        let config = BuildConfig {
            write_batch_size: 0,
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BuildConfig {
            workers: 0,
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_strata_are_rejected() {
        let config = BuildConfig {
            prefix_strata: 32,
            ..BuildConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::Config { .. }
        ));
    }

    #[test]
    fn entry_cap_display() {
        assert_eq!(EntryCap::All.to_string(), "all");
        assert_eq!(EntryCap::Limit(500).to_string(), "500");
    }
}
