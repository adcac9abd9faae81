//! Tile coordinate types.
//!
//! Tiles use the inverted zoom convention of the classic Google Maps tile
//! endpoint: zoom 17 is a single tile covering the whole world, and each step
//! down doubles the number of tiles along each axis.
//!
//! ```text
//! zoom 16 ──► 2 × 2 tiles
//! zoom 15 ──► 4 × 4 tiles
//! zoom  0 ──► 131072 × 131072 tiles
//! ```

use std::fmt;

/// Exclusive upper bound on the zoom levels the cache will serve.
///
/// `MAX_ZOOM - 1` is the coarsest level that can be requested.
pub const MAX_ZOOM: u8 = 16;

/// Zoom level at which the world is one tile wide.
const WORLD_ZOOM: u8 = 17;

/// Identifies one tile: column `x`, row `y` at a given `zoom`.
///
/// Coordinates are signed because callers derive them from viewport math and
/// routinely step off the edge of the map. Such ids are valid values but
/// [`TileId::is_valid`] reports them as out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Column, 0 at the west edge
    pub x: i32,
    /// Row, 0 at the north edge
    pub y: i32,
    /// Zoom level (inverted: larger is coarser)
    pub zoom: u8,
}

impl TileId {
    /// Creates a tile id. No validation is performed.
    #[inline]
    pub const fn new(x: i32, y: i32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Returns true if the id addresses a tile that exists.
    ///
    /// Out-of-range ids resolve to the placeholder without any I/O.
    #[inline]
    pub fn is_valid(&self) -> bool {
        match max_tile_index(self.zoom) {
            Some(max) => {
                self.x >= 0 && self.y >= 0 && i64::from(self.x) <= max && i64::from(self.y) <= max
            }
            None => false,
        }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.x, self.y, self.zoom)
    }
}

impl From<(i32, i32, u8)> for TileId {
    fn from((x, y, zoom): (i32, i32, u8)) -> Self {
        Self::new(x, y, zoom)
    }
}

/// Largest valid column/row index at `zoom`, or `None` if the zoom is not served.
///
/// Equal to `2^(17 - zoom) - 1`.
#[inline]
pub fn max_tile_index(zoom: u8) -> Option<i64> {
    if zoom >= MAX_ZOOM {
        return None;
    }
    Some((1i64 << (WORLD_ZOOM - zoom)) - 1)
}
