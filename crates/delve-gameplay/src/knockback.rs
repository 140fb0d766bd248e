//! Knockback resolution against the tile grid.

use crate::grid::GridQuery;
use crate::immunity::Immunity;
use delve_common::{TileCoord, Timestamp};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Remaining distance below which a push counts as finished.
const SETTLE_EPSILON: f32 = 1e-3;

/// A forced displacement in progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knockback {
    active: bool,
    direction: Vec2,
    remaining: f32,
    speed: f32,
}

impl Default for Knockback {
    fn default() -> Self {
        Self {
            active: false,
            direction: Vec2::Y,
            remaining: 0.0,
            speed: 0.0,
        }
    }
}

/// Outcome of a single knockback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnockbackStep {
    /// No push was in progress.
    Idle,
    /// Moved and still sliding.
    Moved,
    /// Moved the last of the distance.
    Finished,
    /// Hit a wall; the push was absorbed.
    Blocked,
}

impl KnockbackStep {
    /// Whether the push is still in progress after this step.
    #[must_use]
    pub const fn still_active(self) -> bool {
        matches!(self, Self::Moved)
    }
}

impl Knockback {
    /// Creates an inactive knockback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a push of `distance` pixels at `speed` pixels per tick.
    ///
    /// A zero direction pushes straight down. Non-positive distance or speed
    /// leaves the push inactive.
    pub fn apply(&mut self, direction: Vec2, distance: f32, speed: f32) {
        self.direction = direction.try_normalize().unwrap_or(Vec2::Y);
        self.remaining = distance.max(0.0);
        self.speed = speed.max(0.0);
        self.active = self.remaining > SETTLE_EPSILON && self.speed > 0.0;
    }

    /// Advances the push by one tick.
    ///
    /// `pixel` is the top-left corner of the pushed body; its tile is the
    /// floor of `pixel / tile_size`. Every tile the step crosses is checked,
    /// so a fast push cannot skip over a thin wall. A step that meets an
    /// unwalkable tile leaves `pixel` untouched, ends the push, and stretches
    /// an active immunity window by half of what is left of it.
    pub fn tick<G: GridQuery + ?Sized>(
        &mut self,
        pixel: &mut Vec2,
        immunity: &mut Immunity,
        grid: &G,
        now: Timestamp,
        tile_size: f32,
    ) -> KnockbackStep {
        if !self.active {
            return KnockbackStep::Idle;
        }

        let step = self.speed.min(self.remaining);
        let next = *pixel + self.direction * step;

        if let Some(wall) = first_blocked(grid, *pixel, next, tile_size) {
            trace!("Knockback absorbed by wall at {}", wall);
            self.active = false;
            self.remaining = 0.0;
            immunity.extend_by_half_remaining(now);
            return KnockbackStep::Blocked;
        }

        *pixel = next;
        self.remaining -= step;
        if self.remaining <= SETTLE_EPSILON {
            self.active = false;
            self.remaining = 0.0;
            KnockbackStep::Finished
        } else {
            KnockbackStep::Moved
        }
    }

    /// Cancels the push.
    pub fn cancel(&mut self) {
        self.active = false;
        self.remaining = 0.0;
    }

    /// Whether a push is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Unit push direction.
    #[must_use]
    pub const fn direction(&self) -> Vec2 {
        self.direction
    }

    /// Distance left to travel in pixels.
    #[must_use]
    pub const fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Pixels per tick.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }
}

/// First unwalkable tile on the segment `from..=to`, sampled at most one
/// tile apart.
fn first_blocked<G: GridQuery + ?Sized>(
    grid: &G,
    from: Vec2,
    to: Vec2,
    tile_size: f32,
) -> Option<TileCoord> {
    let length = from.distance(to);
    let samples = if tile_size > 0.0 {
        (length / tile_size).ceil().max(1.0) as u32
    } else {
        1
    };
    (1..=samples)
        .map(|i| TileCoord::from_pixel(from.lerp(to, i as f32 / samples as f32), tile_size))
        .find(|tile| !grid.is_walkable(*tile))
}
