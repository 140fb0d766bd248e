//! # Delve Common
//!
//! Common types, utilities, and shared abstractions for Delve.
//!
//! This crate provides foundational types used across all Delve crates:
//! - Coordinate types (tile grid and pixel space)
//! - Agent ids and their per-encounter allocator
//! - Simulation timestamps
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod time;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::time::*;
}

pub use prelude::*;
