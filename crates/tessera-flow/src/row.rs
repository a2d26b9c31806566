//! Tile row (de)serialization glue.
//!
//! Tiles travel through the sink as [`TileRow`]s: the tile body is
//! JSON-marshalled into the row payload and tagged with the revision
//! that produced it. Reading a prior revision back reverses the
//! mapping. Stores never interpret the payload.

use tessera_core::{Revision, Tile, TileRow};

use crate::error::{Error, Result};

/// Serializes a tile into its storage row for `revision`.
///
/// # Errors
///
/// Returns `Error::Serialization` if the tile body cannot be encoded.
pub fn tile_to_row(revision: Revision, tile: &Tile) -> Result<TileRow> {
    let payload = serde_json::to_vec(tile)
        .map_err(|e| Error::serialization(format!("failed to encode tile {}: {e}", tile.path)))?;
    Ok(TileRow {
        revision,
        path: tile.path.as_bytes().to_vec(),
        payload,
    })
}

/// Deserializes a tile from its storage row.
///
/// # Errors
///
/// Returns `Error::Serialization` if the payload is not a valid tile
/// body.
pub fn tile_from_row(row: &TileRow) -> Result<Tile> {
    serde_json::from_slice(&row.payload).map_err(|e| {
        Error::serialization(format!(
            "failed to decode tile row (revision {}): {e}",
            row.revision
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{TileLeaf, TilePath};

    fn sample_tile() -> Tile {
        Tile {
            path: TilePath::new(vec![0xab]),
            leaves: vec![TileLeaf {
                path_suffix: vec![1, 2, 3],
                hash: vec![9; 32],
            }],
            root_hash: vec![7; 32],
        }
    }

    #[test]
    fn row_round_trip_preserves_the_tile() {
        let tile = sample_tile();
        let row = tile_to_row(Revision::new(4), &tile).unwrap();
        assert_eq!(row.revision, Revision::new(4));
        assert_eq!(row.path, tile.path.as_bytes());
        assert_eq!(tile_from_row(&row).unwrap(), tile);
    }

    #[test]
    fn garbage_payload_is_a_serialization_error() {
        let row = TileRow {
            revision: Revision::new(0),
            path: vec![],
            payload: b"not json".to_vec(),
        };
        assert!(matches!(
            tile_from_row(&row).unwrap_err(),
            Error::Serialization { .. }
        ));
    }
}
