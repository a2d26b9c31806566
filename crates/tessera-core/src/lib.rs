//! # tessera-core
//!
//! Core abstractions for the tessera verifiable-map builder.
//!
//! This crate provides the foundational types and traits used across all
//! tessera components:
//!
//! - **Data Model**: Log entries, checkpoints, map tiles, and revisions
//! - **Capability Traits**: Abstract interfaces over the log mirror and
//!   the revisioned tile store
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Structured logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `tessera-core` is the only crate allowed to define shared primitives.
//! The orchestration crate (`tessera-flow`) and the binary
//! (`tessera-build`) depend on the contracts defined here; concrete store
//! backends implement the traits without touching orchestration logic.
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::prelude::*;
//!
//! let store = MemoryTileStore::new();
//! let mirror = MemoryLogMirror::new();
//! let _ = (store, mirror);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod log;
pub mod observability;
pub mod store;
pub mod tile;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tessera_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{Revision, TreeId};
    pub use crate::log::{Checkpoint, Entry, EntryRange};
    pub use crate::store::memory::{MemoryLogMirror, MemoryTileStore};
    pub use crate::store::{LogMirror, MirrorMetadata, RevisionMetadata, TileStore};
    pub use crate::tile::{Leaf, Tile, TileLeaf, TilePath, TileRow};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{Revision, TreeId};
pub use log::{Checkpoint, Entry, EntryRange};
pub use observability::{LogFormat, init_logging};
pub use store::{LogMirror, MirrorMetadata, RevisionMetadata, TileStore};
pub use tile::{Leaf, Tile, TileLeaf, TilePath, TileRow};
