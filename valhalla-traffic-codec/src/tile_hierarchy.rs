//! # The Valhalla Tile Hierarchy
//!
//! Valhalla uses a tiered hierarchy based on road class.
//! Traffic data is laid out on disk following the same tiling,
//! so we need enough of it here to name tiles and place coordinates in them.
//! See <https://valhalla.github.io/valhalla/tiles/> for a full writeup.

use crate::graph_id::{GraphId, InvalidGraphIdError};
use geo::{Coord, Rect, coord};
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TileHierarchyError {
    #[error("Level {level} has no tiling system.")]
    UnknownLevel { level: u8 },
    #[error("Tile ID {tile_id} is outside the grid of level {level}.")]
    TileOutsideLevel { tile_id: u64, level: u8 },
    #[error("Coordinate ({x}, {y}) is outside the tiling system bounds.")]
    CoordinateOutOfBounds { x: f64, y: f64 },
    #[error("Path {0:?} is not a valid tile path.")]
    MalformedPath(PathBuf),
    #[error(transparent)]
    GraphId(#[from] InvalidGraphIdError),
}

/// A tiling system description.
///
/// Valhalla is relatively generic here,
/// though everything is relatively hard-coded to WGS84.
pub struct TilingSystem {
    /// The bounding box of the tiling system.
    pub bounding_box: Rect<f32>,
    /// The size of each side of a square tile.
    pub tile_size: f32,
    /// The number of rows in the tiling system.
    pub n_rows: u32,
    /// The number of columns in the tiling system.
    pub n_cols: u32,
}

impl TilingSystem {
    fn new(bounding_box: Rect<f32>, tile_size: f32) -> Self {
        Self {
            bounding_box,
            tile_size,
            #[expect(clippy::cast_possible_truncation)]
            #[expect(clippy::cast_sign_loss)]
            n_rows: (bounding_box.height() / tile_size).round() as u32,
            #[expect(clippy::cast_possible_truncation)]
            #[expect(clippy::cast_sign_loss)]
            n_cols: (bounding_box.width() / tile_size).round() as u32,
        }
    }

    pub const fn tile_count(&self) -> u32 {
        self.n_rows * self.n_cols
    }

    /// The largest tile ID in this system.
    pub const fn max_tile_id(&self) -> u32 {
        self.tile_count() - 1
    }

    /// Finds the (row-major) tile ID containing the coordinate.
    ///
    /// The max edges of the bounding box belong to the last row/column,
    /// so the poles and the antimeridian at +180 are still inside the grid.
    /// Returns `None` for anything outside the bounding box.
    pub fn tile_id_containing(&self, point: Coord<f64>) -> Option<u32> {
        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let size = f64::from(self.tile_size);

        let cell = |value: f64, lo: f32, hi: f32, count: u32| -> Option<u32> {
            let (lo, hi) = (f64::from(lo), f64::from(hi));
            if !(lo..=hi).contains(&value) {
                return None;
            }
            #[expect(clippy::cast_possible_truncation)]
            #[expect(clippy::cast_sign_loss)]
            let cell = ((value - lo) / size).floor() as u32;
            Some(cell.min(count - 1))
        };

        let col = cell(point.x, min.x, max.x, self.n_cols)?;
        let row = cell(point.y, min.y, max.y, self.n_rows)?;
        Some(row * self.n_cols + col)
    }
}

/// A level in the Valhalla tile hierarchy.
pub struct TileLevel {
    /// The hierarchy level.
    pub level: u8,
    /// The human-readable name of the level.
    pub name: &'static str,
    /// The tiling system used for this level.
    pub tiling_system: TilingSystem,
}

impl TileLevel {
    /// Returns the base [`GraphId`] of the tile containing a `(lon, lat)` coordinate.
    ///
    /// # Errors
    ///
    /// Fails if the coordinate lies outside the tiling system.
    pub fn tile_containing(&self, point: Coord<f64>) -> Result<GraphId, TileHierarchyError> {
        let tile_id = self
            .tiling_system
            .tile_id_containing(point)
            .ok_or(TileHierarchyError::CoordinateOutOfBounds {
                x: point.x,
                y: point.y,
            })?;
        Ok(GraphId::try_from_components(
            self.level,
            u64::from(tile_id),
            0,
        )?)
    }
}

fn world(tile_size: f32) -> TilingSystem {
    TilingSystem::new(
        Rect::new(
            coord! { x: -180f32, y: -90f32 },
            coord! { x: 180f32, y: 90f32 },
        ),
        tile_size,
    )
}

/// A concrete instantiation of the standard Valhalla tile system.
///
/// While other systems are technically possible, you should probably stick to the canonical one.
pub static STANDARD_LEVELS: LazyLock<[TileLevel; 3]> = LazyLock::new(|| {
    [
        TileLevel {
            level: 0,
            name: "highway",
            tiling_system: world(4.0),
        },
        TileLevel {
            level: 1,
            name: "arterial",
            tiling_system: world(1.0),
        },
        TileLevel {
            level: 2,
            name: "local",
            tiling_system: world(0.25),
        },
    ]
});

pub static TRANSIT_LEVEL: LazyLock<TileLevel> = LazyLock::new(|| TileLevel {
    level: 3,
    name: "transit",
    tiling_system: world(0.25),
});

/// Looks up the tile level definition for a hierarchy level.
///
/// # Errors
///
/// Only the standard levels and the transit level have tiling systems.
pub fn tile_level(level: u8) -> Result<&'static TileLevel, TileHierarchyError> {
    if level == TRANSIT_LEVEL.level {
        Ok(&*TRANSIT_LEVEL)
    } else {
        STANDARD_LEVELS
            .get(usize::from(level))
            .ok_or(TileHierarchyError::UnknownLevel { level })
    }
}
