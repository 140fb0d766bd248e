//! Agent events and the bus that carries them to the owning simulation.

use crate::aiming::Facing;
use crate::class::CombatClass;
use crossbeam_channel::{bounded, Receiver, Sender};
use delve_common::{AgentId, TileCoord, Timestamp};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Why a chase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbandonReason {
    /// Target turned invisible
    TargetInvisible,
    /// Target died
    TargetDead,
    /// Deadline passed with the target out of range
    OutOfRange,
    /// No path for too many attempts in a row
    Unreachable,
    /// No grid or no target to chase
    NoCollaborators,
}

/// What an agent did this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Agent spotted the target
    Detected {
        /// Agent
        agent: AgentId,
        /// Agent class
        class: CombatClass,
        /// Whether the target was at critical health
        target_critical: bool,
    },
    /// Agent started chasing
    ChaseStarted {
        /// Agent
        agent: AgentId,
    },
    /// Agent gave up a chase
    ChaseAbandoned {
        /// Agent
        agent: AgentId,
        /// Why
        reason: AbandonReason,
    },
    /// Agent began an attack telegraph
    WindUpStarted {
        /// Agent
        agent: AgentId,
        /// Facing at the start of the wind-up
        facing: Facing,
    },
    /// Agent sent a melee request
    MeleeDispatched {
        /// Agent
        agent: AgentId,
        /// Swing direction
        facing: Facing,
    },
    /// Agent sent a projectile request
    ProjectileDispatched {
        /// Agent
        agent: AgentId,
        /// Unit direction of travel
        aim: Vec2,
    },
    /// Agent was stunned by a hit
    HitStunStarted {
        /// Agent
        agent: AgentId,
        /// Stun end
        until: Timestamp,
    },
    /// Agent HP reached zero
    Died {
        /// Agent
        agent: AgentId,
        /// Tile of death
        tile: TileCoord,
    },
    /// Death grace window elapsed
    Removed {
        /// Agent
        agent: AgentId,
    },
}

impl AgentEvent {
    /// Agent the event is about.
    #[must_use]
    pub const fn agent(&self) -> AgentId {
        match self {
            Self::Detected { agent, .. }
            | Self::ChaseStarted { agent }
            | Self::ChaseAbandoned { agent, .. }
            | Self::WindUpStarted { agent, .. }
            | Self::MeleeDispatched { agent, .. }
            | Self::ProjectileDispatched { agent, .. }
            | Self::HitStunStarted { agent, .. }
            | Self::Died { agent, .. }
            | Self::Removed { agent } => *agent,
        }
    }
}

/// Bounded event channel.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<AgentEvent>,
    receiver: Receiver<AgentEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. Returns false if the bus was full and the event
    /// was dropped.
    pub fn publish(&self, event: AgentEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<AgentEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<AgentEvent> {
        self.sender.clone()
    }
}
