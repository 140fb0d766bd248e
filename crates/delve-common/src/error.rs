//! Error types for Delve.

use thiserror::Error;

/// Top-level error type for Delve operations.
#[derive(Debug, Error)]
pub enum DelveError {
    /// Map/grid errors
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// A map marker with no meaning in the scenario
    #[error("Unknown marker {glyph:?} at {tile}")]
    UnknownMarker {
        /// Marker character
        glyph: char,
        /// Where it was found
        tile: crate::coords::TileCoord,
    },

    /// A scenario missing something it needs
    #[error("Scenario error: {0}")]
    Scenario(String),
}

/// Errors raised while building a tile grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Map has no rows or no columns
    #[error("map is empty")]
    Empty,

    /// A row has a different width from the first row
    #[error("row {row} has width {found}, expected {expected}")]
    Ragged {
        /// Row index
        row: usize,
        /// Width of the first row
        expected: usize,
        /// Width of this row
        found: usize,
    },

    /// A character that is neither floor nor wall
    #[error("unknown map glyph {glyph:?} at ({x}, {y})")]
    UnknownGlyph {
        /// Offending character
        glyph: char,
        /// Column
        x: usize,
        /// Row
        y: usize,
    },
}

/// Result type alias for Delve operations.
pub type DelveResult<T> = Result<T, DelveError>;
