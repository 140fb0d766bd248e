//! # Delve Gameplay
//!
//! Enemy combat core for Delve.
//!
//! This crate drives autonomous enemies on a tile grid:
//! - Grid queries and an ASCII-parsed tile grid
//! - Breadth-first pursuit pathing
//! - 8-way facing and precise aim vectors
//! - Knockback with wall collision and immunity windows
//! - Combat classes, enemy scaling, and boss modifiers
//! - The per-agent behavior state machine
//! - Attack dispatch, agent events, and the event bus
//! - Tuning loaded from TOML
//! - Encounters that own and schedule a group of agents

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod agent;
pub mod aiming;
pub mod class;
pub mod config;
pub mod dispatch;
pub mod encounter;
pub mod events;
pub mod grid;
pub mod immunity;
pub mod knockback;
pub mod pathfind;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::agent::*;
    pub use crate::aiming::*;
    pub use crate::class::*;
    pub use crate::config::*;
    pub use crate::dispatch::*;
    pub use crate::encounter::*;
    pub use crate::events::*;
    pub use crate::grid::*;
    pub use crate::immunity::*;
    pub use crate::knockback::*;
    pub use crate::pathfind::*;
}

pub use prelude::*;
