//! Encounter: the simulation that owns a group of agents.
//!
//! The encounter spawns agents, ticks them in spawn order, decides when they
//! start an attack wind-up, and forwards their events onto the [`EventBus`].

use crate::agent::{Agent, BehaviorKind, Surroundings, TargetSnapshot};
use crate::class::{AgentStats, CombatClass};
use crate::config::AgentTuning;
use crate::dispatch::CombatDispatcher;
use crate::events::{AgentEvent, EventBus};
use crate::grid::GridQuery;
use delve_common::{AgentId, AgentIdAllocator, TileCoord, Timestamp};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error types for encounter operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncounterError {
    /// This encounter never issued the id
    #[error("Agent not found: {0}")]
    UnknownAgent(AgentId),

    /// The agent existed but has been removed
    #[error("Agent already removed: {0}")]
    Removed(AgentId),
}

/// Result type for encounter operations.
pub type EncounterResult<T> = Result<T, EncounterError>;

/// A group of agents sharing one tuning, one map, and one target.
#[derive(Debug)]
pub struct Encounter {
    tuning: Arc<AgentTuning>,
    agents: Vec<Agent>,
    ids: AgentIdAllocator,
    pending_celebrations: HashSet<AgentId>,
    last_target: Option<TargetSnapshot>,
    bus: EventBus,
    rng: fastrand::Rng,
    dropped_events: u64,
}

impl Encounter {
    /// Creates an empty encounter.
    #[must_use]
    pub fn new(tuning: AgentTuning) -> Self {
        let bus = EventBus::new(tuning.event_capacity);
        Self {
            tuning: Arc::new(tuning),
            agents: Vec::new(),
            ids: AgentIdAllocator::new(),
            pending_celebrations: HashSet::new(),
            last_target: None,
            bus,
            rng: fastrand::Rng::new(),
            dropped_events: 0,
        }
    }

    /// Seeds the encounter's random source. Agents spawned afterwards get
    /// seeds derived from it.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Spawns a regular enemy on `tile`.
    pub fn spawn(&mut self, class: CombatClass, tile: TileCoord) -> AgentId {
        let stats = AgentStats::enemy(class, &self.tuning.enemy);
        self.insert(format!("{class}"), stats, tile)
    }

    /// Spawns a boss on `tile`.
    pub fn spawn_boss(&mut self, class: CombatClass, tile: TileCoord) -> AgentId {
        let stats = AgentStats::boss(class, &self.tuning.enemy, &self.tuning.boss);
        self.insert(format!("{class} boss"), stats, tile)
    }

    fn insert(&mut self, name: String, stats: AgentStats, tile: TileCoord) -> AgentId {
        let id = self.ids.next_id();
        let seed = self.rng.u64(..);
        let agent = Agent::new(id, name, stats, tile, Arc::clone(&self.tuning)).with_seed(seed);
        info!("Spawned {} ({}) at {}", agent.name(), id, tile);
        self.agents.push(agent);
        id
    }

    /// Removes an agent immediately.
    pub fn despawn(&mut self, id: AgentId) -> EncounterResult<Agent> {
        let index = self.index_of(id)?;
        self.pending_celebrations.remove(&id);
        Ok(self.agents.remove(index))
    }

    /// Gets an agent.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    /// Gets a mutable agent.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id() == id)
    }

    /// Agents in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    /// Number of agents, including dying ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether there are no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of agents not yet dying.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| !a.is_dying()).count()
    }

    /// Shared tuning.
    #[must_use]
    pub fn tuning(&self) -> &AgentTuning {
        &self.tuning
    }

    /// The event bus agents publish to.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Takes every event published so far.
    pub fn drain_events(&self) -> Vec<AgentEvent> {
        self.bus.drain()
    }

    /// Events lost to a full bus since creation.
    #[must_use]
    pub const fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Ticks every agent once.
    pub fn update(
        &mut self,
        now: Timestamp,
        grid: Option<&dyn GridQuery>,
        target: Option<TargetSnapshot>,
        dispatcher: &mut dyn CombatDispatcher,
    ) {
        self.last_target = target;
        let world = Surroundings { grid, target };

        for agent in &mut self.agents {
            agent.update(now, &world, dispatcher);

            // A queued celebration waits out the fallback and any stun.
            if self.pending_celebrations.contains(&agent.id()) {
                if agent.is_dying() {
                    self.pending_celebrations.remove(&agent.id());
                } else if !matches!(
                    agent.behavior(),
                    BehaviorKind::FallingBack | BehaviorKind::HitStun
                ) {
                    self.pending_celebrations.remove(&agent.id());
                    agent.trigger_celebratory(now);
                }
            }

            if should_wind_up(agent, now, &world) {
                agent.trigger_wind_up(now);
            }
        }

        self.publish_events();
    }

    /// Reports that agent `id` landed a hit on the target. The agent backs
    /// off and may celebrate afterwards.
    pub fn report_landed_hit(&mut self, id: AgentId, now: Timestamp) -> EncounterResult<()> {
        let chance = self.tuning.celebrate_after_hit_chance;
        let celebrate = self.rng.f32() < chance;
        let target = self.last_target;
        let index = self.index_of(id)?;

        let agent = &mut self.agents[index];
        agent.trigger_fallback(now, target.as_ref());
        if celebrate && !agent.is_dying() {
            debug!("{} will celebrate after falling back", id);
            self.pending_celebrations.insert(id);
        }
        Ok(())
    }

    /// Every live agent celebrates, typically after the target is defeated.
    /// Stunned agents finish their stun instead.
    pub fn celebrate_all(&mut self, now: Timestamp) {
        for agent in self.agents.iter_mut().filter(|a| !a.is_dying()) {
            agent.trigger_celebratory(now);
        }
        self.pending_celebrations.clear();
        self.publish_events();
    }

    /// Applies a hit to agent `id` unless it is immune. Returns whether the
    /// hit connected.
    pub fn damage(&mut self, id: AgentId, amount: u32, now: Timestamp) -> EncounterResult<bool> {
        let index = self.index_of(id)?;
        let agent = &mut self.agents[index];
        if agent.is_immune() || agent.is_dying() {
            return Ok(false);
        }
        agent.take_damage(amount, now);
        self.publish_events();
        Ok(true)
    }

    /// Drops agents whose death grace window has elapsed.
    pub fn remove_finished(&mut self) -> Vec<AgentId> {
        let mut removed = Vec::new();
        self.agents.retain(|agent| {
            if agent.should_be_removed() {
                removed.push(agent.id());
                false
            } else {
                true
            }
        });
        for id in &removed {
            self.pending_celebrations.remove(id);
        }
        removed
    }

    fn index_of(&self, id: AgentId) -> EncounterResult<usize> {
        self.agents
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| {
                if self.ids.has_issued(id) {
                    EncounterError::Removed(id)
                } else {
                    EncounterError::UnknownAgent(id)
                }
            })
    }

    fn publish_events(&mut self) {
        for agent in &mut self.agents {
            for event in agent.drain_events() {
                if !self.bus.publish(event) {
                    self.dropped_events += 1;
                }
            }
        }
        if self.dropped_events > 0 && self.bus.pending_count() == self.bus.capacity() {
            warn!("Event bus full, {} events dropped so far", self.dropped_events);
        }
    }
}

fn should_wind_up(agent: &Agent, now: Timestamp, world: &Surroundings<'_>) -> bool {
    let (Some(grid), Some(target)) = (world.grid, world.target) else {
        return false;
    };
    agent.behavior() == BehaviorKind::Chasing
        && target.alive
        && !target.invisible
        && agent.can_attack(now)
        && agent.target_in_reach(&target)
        && grid.has_line_of_sight(agent.tile(), target.tile)
}
