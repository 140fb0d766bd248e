//! Coordinate types for the tile grid and pixel space.
//!
//! Tiles are addressed by integer `(x, y)` with `y` growing downward, matching
//! screen space. Pixel positions are `glam::Vec2` values giving the top-left
//! corner of whatever occupies the tile.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Offsets of the four edge-adjacent neighbours (right, left, down, up).
pub const CARDINAL_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Offsets of all eight neighbours, cardinals first.
pub const ALL_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Integer tile coordinate on the dungeon grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column
    pub x: i32,
    /// Row (grows downward)
    pub y: i32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the tile shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Manhattan (taxicab) distance to another tile.
    #[must_use]
    pub const fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Whether `other` shares an edge with this tile.
    #[must_use]
    pub const fn is_cardinal_neighbor(self, other: Self) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// The four edge-adjacent neighbours in [`CARDINAL_OFFSETS`] order.
    #[must_use]
    pub fn cardinal_neighbors(self) -> [Self; 4] {
        CARDINAL_OFFSETS.map(|(dx, dy)| self.offset(dx, dy))
    }

    /// Top-left pixel of this tile.
    #[must_use]
    pub fn to_pixel(self, tile_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * tile_size, self.y as f32 * tile_size)
    }

    /// Tile containing the given pixel (floor division, so negative pixels map
    /// to negative tiles).
    #[must_use]
    pub fn from_pixel(pixel: Vec2, tile_size: f32) -> Self {
        Self {
            x: (pixel.x / tile_size).floor() as i32,
            y: (pixel.y / tile_size).floor() as i32,
        }
    }
}

impl From<(i32, i32)> for TileCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Center of a tile-sized body whose top-left corner sits at `pixel`.
#[must_use]
pub fn body_center(pixel: Vec2, tile_size: f32) -> Vec2 {
    pixel + Vec2::splat(tile_size / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_manhattan_distance() {
        let a = TileCoord::new(5, 5);
        assert_eq!(a.manhattan_distance(TileCoord::new(5, 2)), 3);
        assert_eq!(a.manhattan_distance(TileCoord::new(2, 9)), 7);
        assert_eq!(a.manhattan_distance(a), 0);
    }

    #[test]
    fn test_cardinal_neighbors() {
        let n = TileCoord::new(0, 0).cardinal_neighbors();
        assert_eq!(
            n,
            [
                TileCoord::new(1, 0),
                TileCoord::new(-1, 0),
                TileCoord::new(0, 1),
                TileCoord::new(0, -1),
            ]
        );
        assert!(n.iter().all(|t| TileCoord::new(0, 0).is_cardinal_neighbor(*t)));
    }

    #[test]
    fn test_from_pixel_negative() {
        assert_eq!(
            TileCoord::from_pixel(Vec2::new(-1.0, 31.9), 32.0),
            TileCoord::new(-1, 0)
        );
    }

    #[test]
    fn test_body_center() {
        assert_eq!(body_center(Vec2::ZERO, 32.0), Vec2::new(16.0, 16.0));
    }

    proptest! {
        #[test]
        fn prop_pixel_inside_tile_maps_back(x in -500i32..500, y in -500i32..500, fx in 0.0f32..31.0, fy in 0.0f32..31.0) {
            let tile = TileCoord::new(x, y);
            let pixel = tile.to_pixel(32.0) + Vec2::new(fx, fy);
            prop_assert_eq!(TileCoord::from_pixel(pixel, 32.0), tile);
        }
    }
}
