//! Grid query service and a concrete tile grid.
//!
//! Agents only read the map. Everything they need is behind [`GridQuery`],
//! so the owning simulation can back it with whatever map representation it
//! likes. [`TileGrid`] is the default implementation, built from ASCII art.

use delve_common::{GridError, TileCoord};
use std::collections::HashSet;

/// Result type for grid construction.
pub type GridResult<T> = Result<T, GridError>;

/// Glyph for a blocking tile.
pub const WALL_GLYPH: char = '#';
/// Glyph for an open tile.
pub const FLOOR_GLYPH: char = '.';

/// Read-only map queries used by agents and the pathfinder.
pub trait GridQuery {
    /// Whether an agent may stand on `tile`. False for out-of-bounds tiles.
    fn is_walkable(&self, tile: TileCoord) -> bool;

    /// Whether `to` is visible from `from`.
    fn has_line_of_sight(&self, from: TileCoord, to: TileCoord) -> bool;
}

/// Rectangular walkability map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: i32,
    height: i32,
    walkable: Vec<bool>,
}

impl TileGrid {
    /// Creates a fully open grid.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            walkable: vec![true; (width * height) as usize],
        }
    }

    /// Parses a map where `#` is a wall and `.` is floor.
    ///
    /// Leading and trailing whitespace on each line is ignored, as are blank
    /// lines. Letters are accepted as floor tiles; use
    /// [`TileGrid::parse_with_markers`] to recover their positions.
    pub fn from_ascii(map: &str) -> GridResult<Self> {
        Self::parse_with_markers(map).map(|(grid, _)| grid)
    }

    /// Parses a map and returns the position of every letter marker.
    ///
    /// Markers are floor tiles. They are returned in row-major order.
    pub fn parse_with_markers(map: &str) -> GridResult<(Self, Vec<(char, TileCoord)>)> {
        let rows: Vec<&str> = map
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let width = rows.first().map_or(0, |row| row.chars().count());
        if rows.is_empty() || width == 0 {
            return Err(GridError::Empty);
        }

        let mut walkable = Vec::with_capacity(width * rows.len());
        let mut markers = Vec::new();

        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(GridError::Ragged {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                match glyph {
                    WALL_GLYPH => walkable.push(false),
                    FLOOR_GLYPH => walkable.push(true),
                    c if c.is_ascii_alphabetic() => {
                        walkable.push(true);
                        markers.push((c, TileCoord::new(x as i32, y as i32)));
                    },
                    _ => return Err(GridError::UnknownGlyph { glyph, x, y }),
                }
            }
        }

        let grid = Self {
            width: width as i32,
            height: rows.len() as i32,
            walkable,
        };
        Ok((grid, markers))
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Whether `tile` lies inside the grid.
    #[must_use]
    pub const fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    /// Marks a tile as open or blocked. Out-of-bounds tiles are ignored.
    pub fn set_walkable(&mut self, tile: TileCoord, walkable: bool) {
        if let Some(index) = self.index(tile) {
            self.walkable[index] = walkable;
        }
    }

    /// Iterates every walkable tile in row-major order.
    pub fn walkable_tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width)
                .map(move |x| TileCoord::new(x, y))
                .filter(move |tile| self.is_walkable(*tile))
        })
    }

    fn index(&self, tile: TileCoord) -> Option<usize> {
        self.contains(tile)
            .then(|| (tile.y * self.width + tile.x) as usize)
    }
}

impl GridQuery for TileGrid {
    fn is_walkable(&self, tile: TileCoord) -> bool {
        self.index(tile).is_some_and(|index| self.walkable[index])
    }

    fn has_line_of_sight(&self, from: TileCoord, to: TileCoord) -> bool {
        bresenham_line(from, to).all(|tile| self.is_walkable(tile))
    }
}

/// Tiles on the Bresenham line from `from` to `to`, both ends included.
pub fn bresenham_line(from: TileCoord, to: TileCoord) -> impl Iterator<Item = TileCoord> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };

    let mut current = Some(from);
    let mut err = dx + dy;

    std::iter::from_fn(move || {
        let tile = current?;
        if tile == to {
            current = None;
            return Some(tile);
        }
        let mut next = tile;
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            next.x += sx;
        }
        if e2 <= dx {
            err += dx;
            next.y += sy;
        }
        current = Some(next);
        Some(tile)
    })
}

/// Mock grid for testing.
///
/// Bounded open field with individually blocked tiles. Line of sight can be
/// forced on or off, otherwise it follows the same Bresenham rule as
/// [`TileGrid`].
#[derive(Debug, Clone)]
pub struct MockGrid {
    width: i32,
    height: i32,
    blocked: HashSet<TileCoord>,
    los_override: Option<bool>,
}

impl MockGrid {
    /// Creates an open mock grid of the given size.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            blocked: HashSet::new(),
            los_override: None,
        }
    }

    /// Forces every line-of-sight query to return `los`.
    #[must_use]
    pub const fn with_los(mut self, los: bool) -> Self {
        self.los_override = Some(los);
        self
    }

    /// Blocks a tile.
    pub fn block(&mut self, x: i32, y: i32) {
        self.blocked.insert(TileCoord::new(x, y));
    }

    /// Reopens a tile.
    pub fn unblock(&mut self, x: i32, y: i32) {
        self.blocked.remove(&TileCoord::new(x, y));
    }
}

impl GridQuery for MockGrid {
    fn is_walkable(&self, tile: TileCoord) -> bool {
        tile.x >= 0
            && tile.y >= 0
            && tile.x < self.width
            && tile.y < self.height
            && !self.blocked.contains(&tile)
    }

    fn has_line_of_sight(&self, from: TileCoord, to: TileCoord) -> bool {
        match self.los_override {
            Some(los) => los,
            None => bresenham_line(from, to).all(|tile| self.is_walkable(tile)),
        }
    }
}
