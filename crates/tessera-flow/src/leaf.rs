//! Leaf derivation.
//!
//! Turns log entries into map leaves. All digests are SHA-256 with a
//! domain-separation tag and the tree ID as salt, so distinct trees
//! sharing a store produce unrelated leaves.
//!
//! Two independent leaf streams exist: the main per-entry stream, and
//! the optional version-history stream that adds, for each distinct
//! key, one leaf committing to the ordered list of that key's payload
//! digests. When both are enabled the streams are flattened into one:
//! a union, not a join.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use tessera_core::tile::LEAF_PATH_LEN;
use tessera_core::{Entry, Leaf, TreeId};

/// Domain tag for leaf path derivation.
const TAG_LEAF_PATH: &[u8] = b"tessera/leaf/path";
/// Domain tag for leaf value derivation.
const TAG_LEAF_VALUE: &[u8] = b"tessera/leaf/value";
/// Domain tag for version-history leaf paths.
const TAG_HISTORY_PATH: &[u8] = b"tessera/history/path";
/// Domain tag for version-history leaf values.
const TAG_HISTORY_VALUE: &[u8] = b"tessera/history/value";

fn digest(tag: &[u8], tree_id: TreeId, parts: &[&[u8]]) -> [u8; LEAF_PATH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(tree_id.to_le_bytes());
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derives the map leaf for one log entry.
///
/// The leaf path is the salted digest of the entry key; the leaf hash
/// commits to the payload. Pure and order-independent, so it is safe to
/// run across any number of workers.
#[must_use]
pub fn entry_leaf(tree_id: TreeId, entry: &Entry) -> Leaf {
    Leaf {
        path: digest(TAG_LEAF_PATH, tree_id, &[entry.key.as_bytes()]),
        hash: digest(TAG_LEAF_VALUE, tree_id, &[&entry.payload]),
    }
}

/// Derives the version-history leaves for a batch of entries.
///
/// Entries are grouped by key; within each key they are ordered by log
/// ID, so the resulting commitment is independent of the order the
/// batch arrived in. Each distinct key yields exactly one leaf whose
/// value commits to the full sequence of payload digests for that key.
#[must_use]
pub fn version_history_leaves(tree_id: TreeId, entries: &[Entry]) -> Vec<Leaf> {
    let mut by_key: BTreeMap<&str, Vec<&Entry>> = BTreeMap::new();
    for entry in entries {
        by_key.entry(entry.key.as_str()).or_default().push(entry);
    }

    by_key
        .into_iter()
        .map(|(key, mut versions)| {
            versions.sort_by_key(|entry| entry.id);
            let mut hasher = Sha256::new();
            hasher.update(TAG_HISTORY_VALUE);
            hasher.update(tree_id.to_le_bytes());
            for entry in versions {
                hasher.update(digest(TAG_LEAF_VALUE, tree_id, &[&entry.payload]));
            }
            Leaf {
                path: digest(TAG_HISTORY_PATH, tree_id, &[key.as_bytes()]),
                hash: hasher.finalize().into(),
            }
        })
        .collect()
}
