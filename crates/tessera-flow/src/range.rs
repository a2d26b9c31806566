//! Range and mode resolution.
//!
//! Given the mirror's total entry count, the requested cap, and the
//! mode switch, decide the half-open entry range the new revision will
//! consume and which build mode applies. This is a pure function so
//! every branch is trivially testable; the orchestrator supplies the
//! store reads.

use tessera_core::{EntryRange, Revision, RevisionMetadata};

use crate::config::EntryCap;
use crate::error::{Error, Result};

/// The build mode decided for one invocation.
///
/// Exactly one mode applies per build; they are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Rebuild from scratch, ignoring all prior tiles.
    Full,
    /// Merge the latest committed revision's tiles with newly arrived
    /// entries.
    Incremental {
        /// The revision whose tiles seed the update.
        last_revision: Revision,
    },
}

impl BuildMode {
    /// Short label for logs and spans.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental { .. } => "incremental",
        }
    }
}

/// The outcome of range resolution: what to read, and how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBuild {
    /// Entry range `[start, end)` the build consumes.
    pub range: EntryRange,
    /// Full rebuild or incremental update.
    pub mode: BuildMode,
}

/// Resolves the entry range and build mode for one invocation.
///
/// - `end` is the mirror total when the cap is [`EntryCap::All`], else
///   the cap value.
/// - In full mode `start` is always 0; an empty mirror is legal and
///   produces an empty tree.
/// - In incremental mode `start` is the latest committed revision's
///   covered entry count.
///
/// # Errors
///
/// Returns `Error::Range` if the cap exceeds the available entries, if
/// incremental mode finds no prior committed revision, or if the
/// incremental range would not advance (`start >= end`).
pub fn resolve(
    total_entries: u64,
    cap: EntryCap,
    incremental: bool,
    latest: Option<&RevisionMetadata>,
) -> Result<ResolvedBuild> {
    let end = match cap {
        EntryCap::All => total_entries,
        EntryCap::Limit(n) => {
            if n > total_entries {
                return Err(Error::range(format!(
                    "wanted {n} entries but only {total_entries} available"
                )));
            }
            n
        }
    };

    if !incremental {
        return Ok(ResolvedBuild {
            range: EntryRange::new(0, end),
            mode: BuildMode::Full,
        });
    }

    let Some(latest) = latest else {
        return Err(Error::range(
            "incremental update requested but no revision has ever been committed",
        ));
    };
    let start = latest.covered_entries;
    if start >= end {
        return Err(Error::range(format!(
            "incremental range does not advance: start {start} >= end {end}"
        )));
    }

    Ok(ResolvedBuild {
        range: EntryRange::new(start, end),
        mode: BuildMode::Incremental {
            last_revision: latest.revision,
        },
    })
}
