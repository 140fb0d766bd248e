//! Combat dispatcher seam.
//!
//! Agents decide *when* and *where* to attack. Hit resolution, damage, and
//! projectile simulation belong to whoever implements [`CombatDispatcher`].

use crate::aiming::Facing;
use crate::class::CombatClass;
use delve_common::{AgentId, TileCoord, Timestamp};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Snapshot of the attacking agent handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOrigin {
    /// Attacker
    pub agent: AgentId,
    /// Attacker class
    pub class: CombatClass,
    /// Attacker tile
    pub tile: TileCoord,
    /// Center of the attacker's body in pixels
    pub center: Vec2,
    /// Scaled attack power
    pub attack: u32,
    /// Melee reach in tiles
    pub melee_reach: f32,
    /// Melee arc width in degrees
    pub arc_degrees: f32,
    /// Projectile speed in pixels per tick, zero without projectiles
    pub projectile_speed: f32,
    /// Projectile reach in tiles
    pub projectile_reach: f32,
    /// When the request was made
    pub at: Timestamp,
}

/// Receives fire-and-forget attack requests from agents.
pub trait CombatDispatcher {
    /// A melee swing toward `facing`.
    fn request_melee_attack(&mut self, origin: &AttackOrigin, facing: Facing);

    /// A projectile launched along the unit vector `aim`.
    fn request_projectile_attack(&mut self, origin: &AttackOrigin, aim: Vec2);
}

/// Which attack an agent releases at the end of a wind-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackMode {
    /// Melee arc along the quantized facing
    Melee,
    /// Projectile along the precise aim
    Projectile,
}

/// Kind of a queued attack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttackKind {
    /// Melee arc
    Melee {
        /// Swing direction
        facing: Facing,
    },
    /// Projectile
    Projectile {
        /// Unit direction of travel
        aim: Vec2,
    },
}

/// An attack request waiting for resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackIntent {
    /// Who attacked and with what stats
    pub origin: AttackOrigin,
    /// Melee or projectile
    pub kind: AttackKind,
}

/// Dispatcher that just records requests in arrival order.
#[derive(Debug, Default)]
pub struct AttackQueue {
    pending: VecDeque<AttackIntent>,
}

impl AttackIntent {
    /// Melee or projectile.
    #[must_use]
    pub const fn mode(&self) -> AttackMode {
        match self.kind {
            AttackKind::Melee { .. } => AttackMode::Melee,
            AttackKind::Projectile { .. } => AttackMode::Projectile,
        }
    }
}

impl AttackQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every pending intent.
    pub fn drain(&mut self) -> Vec<AttackIntent> {
        self.pending.drain(..).collect()
    }

    /// Number of pending intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no intents are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending intents in order.
    pub fn iter(&self) -> impl Iterator<Item = &AttackIntent> {
        self.pending.iter()
    }
}

impl CombatDispatcher for AttackQueue {
    fn request_melee_attack(&mut self, origin: &AttackOrigin, facing: Facing) {
        self.pending.push_back(AttackIntent {
            origin: origin.clone(),
            kind: AttackKind::Melee { facing },
        });
    }

    fn request_projectile_attack(&mut self, origin: &AttackOrigin, aim: Vec2) {
        self.pending.push_back(AttackIntent {
            origin: origin.clone(),
            kind: AttackKind::Projectile { aim },
        });
    }
}
