//! Prefix-tree construction.
//!
//! [`TreeBuilder`] is the capability seam for the tree-construction
//! algorithm: a pure mapping from a set of keyed leaves (plus, for
//! updates, the prior revision's tiles) to the complete tile set of a
//! new revision. The orchestrator never looks inside it.
//!
//! [`StrataTreeBuilder`] is the reference implementation used by the
//! binary and the tests. It builds the fixed-depth tree directly: one
//! tile per populated byte prefix for each of the `prefix_strata`
//! levels, and final-stratum tiles holding the leaves themselves. An
//! update folds the prior revision's leaves back out of its
//! final-stratum tiles and rebuilds.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use tessera_core::tile::LEAF_PATH_LEN;
use tessera_core::{Leaf, Tile, TileLeaf, TilePath, TreeId};

use crate::error::{Error, Result};

/// Domain tag for tile root hashes.
const TAG_TILE: &[u8] = b"tessera/tile";

/// Capability interface for the tree-construction algorithm.
///
/// Both operations are pure functions of their inputs: same leaves and
/// prior tiles, same output tile set. `tree_id` salts hashing to
/// disambiguate trees sharing a store; `prefix_strata` fixes the number
/// of fixed-width byte-prefix levels before the final stratum.
pub trait TreeBuilder: Send + Sync {
    /// Builds the complete tile set for a tree from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if the leaves are malformed for this tree shape.
    fn create(&self, leaves: &[Leaf], tree_id: TreeId, prefix_strata: usize) -> Result<Vec<Tile>>;

    /// Builds the complete tile set for a tree by merging new leaves
    /// into the tile set of a prior revision.
    ///
    /// A new leaf at an existing path replaces the prior leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if the prior tiles are inconsistent with
    /// `prefix_strata`.
    fn update(
        &self,
        prior_tiles: &[Tile],
        leaves: &[Leaf],
        tree_id: TreeId,
        prefix_strata: usize,
    ) -> Result<Vec<Tile>>;
}

/// Reference tree builder over SHA-256.
///
/// Duplicate leaf paths within one batch resolve to the
/// lexicographically largest value hash, so the result is independent
/// of processing order.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrataTreeBuilder;

impl StrataTreeBuilder {
    /// Creates a new reference builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

type LeafMap = BTreeMap<[u8; LEAF_PATH_LEN], [u8; LEAF_PATH_LEN]>;

/// Folds a batch of leaves into the map, resolving duplicates to the
/// largest hash.
fn merge_batch(map: &mut LeafMap, leaves: &[Leaf]) {
    for leaf in leaves {
        map.entry(leaf.path)
            .and_modify(|existing| {
                if leaf.hash > *existing {
                    *existing = leaf.hash;
                }
            })
            .or_insert(leaf.hash);
    }
}

/// Recovers the full leaf map from a prior revision's final-stratum tiles.
fn leaves_from_tiles(tiles: &[Tile], prefix_strata: usize) -> Result<LeafMap> {
    let mut map = LeafMap::new();
    for tile in tiles {
        let depth = tile.path.depth();
        if depth > prefix_strata {
            return Err(Error::build(
                "tree",
                format!(
                    "prior tile at depth {depth} exceeds prefix strata {prefix_strata}; \
                     was the tree built with different strata?"
                ),
            ));
        }
        if depth < prefix_strata {
            // Upper-stratum tile; its content is derivable from the
            // final stratum.
            continue;
        }
        for entry in &tile.leaves {
            let mut path = [0u8; LEAF_PATH_LEN];
            let prefix = tile.path.as_bytes();
            if prefix.len() + entry.path_suffix.len() != LEAF_PATH_LEN
                || entry.hash.len() != LEAF_PATH_LEN
            {
                return Err(Error::build(
                    "tree",
                    format!("malformed leaf in prior tile {}", tile.path),
                ));
            }
            path[..prefix.len()].copy_from_slice(prefix);
            path[prefix.len()..].copy_from_slice(&entry.path_suffix);
            let mut hash = [0u8; LEAF_PATH_LEN];
            hash.copy_from_slice(&entry.hash);
            // Prior leaves are authoritative until a new leaf at the
            // same path overrides them, so plain insert is correct here.
            map.insert(path, hash);
        }
    }
    Ok(map)
}

fn tile_hash(tree_id: TreeId, path: &[u8], leaves: &[TileLeaf]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(TAG_TILE);
    hasher.update(tree_id.to_le_bytes());
    hasher.update((path.len() as u64).to_le_bytes());
    hasher.update(path);
    for leaf in leaves {
        hasher.update((leaf.path_suffix.len() as u64).to_le_bytes());
        hasher.update(&leaf.path_suffix);
        hasher.update(&leaf.hash);
    }
    hasher.finalize().to_vec()
}

/// Builds the complete tile set from a resolved leaf map.
fn build_tiles(map: &LeafMap, tree_id: TreeId, prefix_strata: usize) -> Vec<Tile> {
    // Final stratum: group leaves by their path prefix.
    let mut final_groups: BTreeMap<Vec<u8>, Vec<TileLeaf>> = BTreeMap::new();
    for (path, hash) in map {
        final_groups
            .entry(path[..prefix_strata].to_vec())
            .or_default()
            .push(TileLeaf {
                path_suffix: path[prefix_strata..].to_vec(),
                hash: hash.to_vec(),
            });
    }

    let mut tiles = Vec::new();
    let mut current: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    for (prefix, leaves) in final_groups {
        // BTreeMap iteration already sorted the leaves by suffix.
        let root_hash = tile_hash(tree_id, &prefix, &leaves);
        current.insert(prefix.clone(), root_hash.clone());
        tiles.push(Tile {
            path: TilePath::new(prefix),
            leaves,
            root_hash,
        });
    }

    // Upper strata, bottom-up: each tile summarizes its child tiles by
    // their trailing byte.
    for depth in (0..prefix_strata).rev() {
        let mut groups: BTreeMap<Vec<u8>, Vec<TileLeaf>> = BTreeMap::new();
        for (child_path, child_hash) in &current {
            let (prefix, last) = child_path.split_at(depth);
            groups.entry(prefix.to_vec()).or_default().push(TileLeaf {
                path_suffix: last.to_vec(),
                hash: child_hash.clone(),
            });
        }
        current = BTreeMap::new();
        for (prefix, leaves) in groups {
            let root_hash = tile_hash(tree_id, &prefix, &leaves);
            current.insert(prefix.clone(), root_hash.clone());
            tiles.push(Tile {
                path: TilePath::new(prefix),
                leaves,
                root_hash,
            });
        }
    }

    // An empty tree still has a root tile, so every revision persists
    // at least one row.
    if tiles.is_empty() {
        tiles.push(Tile {
            path: TilePath::root(),
            leaves: Vec::new(),
            root_hash: tile_hash(tree_id, &[], &[]),
        });
    }

    tiles
}

impl TreeBuilder for StrataTreeBuilder {
    fn create(&self, leaves: &[Leaf], tree_id: TreeId, prefix_strata: usize) -> Result<Vec<Tile>> {
        let mut map = LeafMap::new();
        merge_batch(&mut map, leaves);
        Ok(build_tiles(&map, tree_id, prefix_strata))
    }

    fn update(
        &self,
        prior_tiles: &[Tile],
        leaves: &[Leaf],
        tree_id: TreeId,
        prefix_strata: usize,
    ) -> Result<Vec<Tile>> {
        let mut map = leaves_from_tiles(prior_tiles, prefix_strata)?;
        // Resolve duplicates within the new batch first; the batch then
        // overrides prior leaves unconditionally.
        let mut batch = LeafMap::new();
        merge_batch(&mut batch, leaves);
        map.extend(batch);
        Ok(build_tiles(&map, tree_id, prefix_strata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: TreeId = TreeId::new(12345);

    fn leaf(seed: u8) -> Leaf {
        let mut path = [0u8; LEAF_PATH_LEN];
        let mut hash = [0u8; LEAF_PATH_LEN];
        path[0] = seed;
        path[1] = seed.wrapping_mul(7);
        hash[0] = seed.wrapping_add(1);
        Leaf { path, hash }
    }

    fn root_of(tiles: &[Tile]) -> &Tile {
        tiles.iter().find(|t| t.path.depth() == 0).unwrap()
    }

    #[test]
    fn empty_create_yields_single_root_tile() {
        let tiles = StrataTreeBuilder::new().create(&[], TREE, 2).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].path, TilePath::root());
        assert!(tiles[0].leaves.is_empty());
        assert!(!tiles[0].root_hash.is_empty());
    }

    #[test]
    fn create_is_order_independent() {
        let builder = StrataTreeBuilder::new();
        let leaves = vec![leaf(1), leaf(2), leaf(3), leaf(4)];
        let mut reversed = leaves.clone();
        reversed.reverse();
        assert_eq!(
            builder.create(&leaves, TREE, 2).unwrap(),
            builder.create(&reversed, TREE, 2).unwrap()
        );
    }

    #[test]
    fn duplicate_paths_resolve_order_independently() {
        let builder = StrataTreeBuilder::new();
        let mut a = leaf(1);
        let mut b = leaf(1);
        a.hash[0] = 10;
        b.hash[0] = 20;
        assert_eq!(
            builder.create(&[a, b], TREE, 2).unwrap(),
            builder.create(&[b, a], TREE, 2).unwrap()
        );
    }

    #[test]
    fn tile_depths_respect_strata() {
        let tiles = StrataTreeBuilder::new()
            .create(&[leaf(1), leaf(2)], TREE, 2)
            .unwrap();
        assert!(tiles.iter().all(|t| t.path.depth() <= 2));
        for tile in tiles.iter().filter(|t| t.path.depth() == 2) {
            for entry in &tile.leaves {
                assert_eq!(entry.path_suffix.len(), LEAF_PATH_LEN - 2);
            }
        }
        // Root exists and summarizes its children with one-byte suffixes.
        let root = root_of(&tiles);
        assert!(root.leaves.iter().all(|l| l.path_suffix.len() == 1));
    }

    #[test]
    fn zero_strata_puts_all_leaves_in_the_root() {
        let tiles = StrataTreeBuilder::new()
            .create(&[leaf(1), leaf(2)], TREE, 0)
            .unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].path.depth(), 0);
        assert_eq!(tiles[0].leaves.len(), 2);
    }

    #[test]
    fn update_equals_create_on_the_union() {
        let builder = StrataTreeBuilder::new();
        let first = vec![leaf(1), leaf(2)];
        let second = vec![leaf(3), leaf(4)];

        let prior = builder.create(&first, TREE, 2).unwrap();
        let updated = builder.update(&prior, &second, TREE, 2).unwrap();

        let all: Vec<Leaf> = first.iter().chain(second.iter()).copied().collect();
        assert_eq!(updated, builder.create(&all, TREE, 2).unwrap());
    }

    #[test]
    fn update_overrides_prior_leaf_at_same_path() {
        let builder = StrataTreeBuilder::new();
        let old = leaf(1);
        let mut new = leaf(1);
        new.hash = [0u8; LEAF_PATH_LEN]; // smaller than old.hash

        let prior = builder.create(&[old], TREE, 2).unwrap();
        let updated = builder.update(&prior, &[new], TREE, 2).unwrap();

        // The new leaf wins even though its hash sorts below the old one.
        assert_eq!(updated, builder.create(&[new], TREE, 2).unwrap());
    }

    #[test]
    fn update_rejects_mismatched_strata() {
        let builder = StrataTreeBuilder::new();
        let prior = builder.create(&[leaf(1)], TREE, 3).unwrap();
        let err = builder.update(&prior, &[leaf(2)], TREE, 2).unwrap_err();
        assert!(matches!(err, Error::Build { .. }));
    }

    #[test]
    fn root_hash_commits_to_every_leaf() {
        let builder = StrataTreeBuilder::new();
        let base = builder.create(&[leaf(1), leaf(2)], TREE, 2).unwrap();
        let mut changed_leaf = leaf(2);
        changed_leaf.hash[5] ^= 0xff;
        let changed = builder.create(&[leaf(1), changed_leaf], TREE, 2).unwrap();
        assert_ne!(root_of(&base).root_hash, root_of(&changed).root_hash);
    }

    #[test]
    fn tree_id_salts_tile_hashes() {
        let builder = StrataTreeBuilder::new();
        let a = builder.create(&[leaf(1)], TreeId::new(1), 2).unwrap();
        let b = builder.create(&[leaf(1)], TreeId::new(2), 2).unwrap();
        assert_ne!(root_of(&a).root_hash, root_of(&b).root_hash);
    }
}
