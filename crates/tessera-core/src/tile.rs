//! Map tiles, leaves, and the storage row format.
//!
//! A tile is one node of the fixed-depth prefix tree, keyed by its path
//! (the byte prefix identifying its position). Tiles from different
//! revisions are distinct rows even when their paths coincide, and a tile
//! is immutable once written.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::Revision;

/// The number of bytes in a leaf path (SHA-256 output width).
pub const LEAF_PATH_LEN: usize = 32;

/// A map leaf derived from one log entry.
///
/// The path places the leaf in the prefix tree; the hash commits to the
/// entry's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// Full tree path of the leaf (hash of the entry key, salted).
    pub path: [u8; LEAF_PATH_LEN],
    /// Commitment to the leaf value.
    pub hash: [u8; LEAF_PATH_LEN],
}

/// The byte-prefix position of a tile within the tree.
///
/// The root tile has the empty path; a tile at stratum `n` has a path of
/// `n` bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TilePath(Vec<u8>);

impl TilePath {
    /// Creates a tile path from raw prefix bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The root tile path (empty prefix).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the raw prefix bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the stratum depth of this path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for TilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// One entry within a tile.
///
/// In a final-stratum tile the suffix completes a leaf path and the hash
/// is the leaf commitment. In an upper-stratum tile the suffix is a
/// single child byte and the hash is the child tile's root hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLeaf {
    /// Path suffix below this tile's prefix.
    pub path_suffix: Vec<u8>,
    /// Commitment for the subtree or leaf at that suffix.
    pub hash: Vec<u8>,
}

/// One node of the prefix tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Position of this tile in the tree.
    pub path: TilePath,
    /// Entries beneath this tile, sorted by path suffix.
    pub leaves: Vec<TileLeaf>,
    /// Hash committing to everything beneath this tile.
    pub root_hash: Vec<u8>,
}

/// The persisted row form of a tile.
///
/// Rows are tagged with the revision that produced them; the payload is
/// the serialized tile body. Stores treat the payload as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRow {
    /// Revision this row belongs to.
    pub revision: Revision,
    /// Tile path bytes (the row key within a revision).
    pub path: Vec<u8>,
    /// Serialized tile body.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_path_display_is_hex() {
        let path = TilePath::new(vec![0xab, 0x01]);
        assert_eq!(path.to_string(), "ab01");
        assert_eq!(TilePath::root().to_string(), "(root)");
    }

    #[test]
    fn tile_path_depth() {
        assert_eq!(TilePath::root().depth(), 0);
        assert_eq!(TilePath::new(vec![1, 2, 3]).depth(), 3);
    }

    #[test]
    fn tile_paths_order_by_prefix() {
        let a = TilePath::new(vec![0x01]);
        let b = TilePath::new(vec![0x01, 0x00]);
        let c = TilePath::new(vec![0x02]);
        assert!(a < b);
        assert!(b < c);
    }
}
