//! Build pipeline for the verifiable map.
//!
//! `tessera-flow` turns a mirrored append-only log into revisioned
//! map tiles. One invocation of the [`BuildOrchestrator`] performs one
//! build: it resolves the entry range to consume (a full rebuild or an
//! incremental update on top of the last committed revision), derives
//! map leaves from the entries, constructs the fixed-depth prefix tree
//! through a [`TreeBuilder`], and persists the resulting tiles under a
//! freshly allocated revision, committing only after every tile row is
//! durable.
//!
//! The pipeline itself is a statically typed graph of [`Transform`] and
//! [`Aggregate`] stages assembled as a value and executed at a single
//! join point; see the [`graph`] module.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod graph;
pub mod leaf;
pub mod metrics;
pub mod orchestrator;
pub mod range;
pub mod row;
pub mod tree;

pub use config::{BuildConfig, EntryCap};
pub use error::{Error, Result};
pub use graph::{Aggregate, BuildGraph, GraphStats, Transform};
pub use metrics::BuildMetrics;
pub use orchestrator::{BuildOrchestrator, BuildSummary};
pub use range::{BuildMode, ResolvedBuild};
pub use tree::{StrataTreeBuilder, TreeBuilder};

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::config::{BuildConfig, EntryCap};
    pub use crate::error::{Error, Result};
    pub use crate::orchestrator::{BuildOrchestrator, BuildSummary};
    pub use crate::range::BuildMode;
    pub use crate::tree::{StrataTreeBuilder, TreeBuilder};
}
