//! Per-agent behavior state machine.
//!
//! An [`Agent`] is one enemy or boss. Every tick the owning simulation calls
//! [`Agent::update`] with the current time, a read-only view of the map and
//! the player, and a dispatcher for attack requests. The agent mutates only
//! itself.
//!
//! Tick order:
//! 1. Dying agents only count down to removal.
//! 2. Immunity expires and hit-stun ends (always back into a chase).
//! 3. An active knockback takes the whole tick.
//! 4. Temporary states (wind-up, celebrate, fall back, detect) run their timers.
//! 5. Roaming agents look for the target; chasing agents follow their path.
//! 6. The body slides toward its target tile and re-aims.

use crate::aiming::{Aim, Facing};
use crate::class::{AgentStats, CombatClass};
use crate::config::AgentTuning;
use crate::dispatch::{AttackMode, AttackOrigin, CombatDispatcher};
use crate::events::{AbandonReason, AgentEvent};
use crate::grid::GridQuery;
use crate::immunity::Immunity;
use crate::knockback::Knockback;
use crate::pathfind::{find_path, PathCache};
use delve_common::{body_center, AgentId, TileCoord, Timestamp, ALL_OFFSETS};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Distance under which a body counts as standing on its target tile.
const SETTLED_EPSILON: f32 = 0.01;

/// Random picks tried before a roaming agent gives up for the tick.
const ROAM_ATTEMPTS: usize = 8;

/// What an agent can see of the player this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    /// Logical tile
    pub tile: TileCoord,
    /// Top-left pixel of the body
    pub pixel: Vec2,
    /// Whether the target is alive
    pub alive: bool,
    /// Whether the target is invisible
    pub invisible: bool,
    /// Current HP over max HP
    pub health_fraction: f32,
}

impl TargetSnapshot {
    /// A healthy, visible target standing exactly on `tile`.
    #[must_use]
    pub fn at_tile(tile: TileCoord, tile_size: f32) -> Self {
        Self {
            tile,
            pixel: tile.to_pixel(tile_size),
            alive: true,
            invisible: false,
            health_fraction: 1.0,
        }
    }

    /// Sets the invisibility flag.
    #[must_use]
    pub const fn with_invisible(mut self, invisible: bool) -> Self {
        self.invisible = invisible;
        self
    }

    /// Sets the alive flag.
    #[must_use]
    pub const fn with_alive(mut self, alive: bool) -> Self {
        self.alive = alive;
        self
    }

    /// Sets the health fraction.
    #[must_use]
    pub fn with_health_fraction(mut self, fraction: f32) -> Self {
        self.health_fraction = fraction.clamp(0.0, 1.0);
        self
    }
}

/// Read-only collaborators for one tick. Either may be missing.
#[derive(Clone, Copy, Default)]
pub struct Surroundings<'a> {
    /// Map queries
    pub grid: Option<&'a dyn GridQuery>,
    /// The player
    pub target: Option<TargetSnapshot>,
}

impl<'a> Surroundings<'a> {
    /// Both collaborators present.
    #[must_use]
    pub fn new(grid: &'a dyn GridQuery, target: TargetSnapshot) -> Self {
        Self {
            grid: Some(grid),
            target: Some(target),
        }
    }

    /// A map but no player.
    #[must_use]
    pub fn grid_only(grid: &'a dyn GridQuery) -> Self {
        Self {
            grid: Some(grid),
            target: None,
        }
    }
}

/// Exactly one of these is active per agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Wandering between random neighbours
    Roaming,
    /// Frozen for a beat after spotting the target
    Detecting,
    /// Pathing toward the target
    Chasing,
    /// Telegraphing an attack
    WindingUp {
        /// Chase again afterwards
        resume_chase: bool,
        /// Aim captured at entry, used for the attack
        aim: Aim,
    },
    /// Reeling from a hit
    HitStun {
        /// Whether a chase was underway at entry
        was_chasing: bool,
        /// Immunity end applied when the stun wears off
        immunity_until: Timestamp,
    },
    /// Gloating
    Celebrating {
        /// Chase again afterwards
        resume_chase: bool,
    },
    /// Backing away after a landed hit
    FallingBack {
        /// Chase again afterwards
        resume_chase: bool,
        /// Top-left pixel to retreat to
        retreat: Vec2,
    },
    /// HP reached zero, waiting out the death animation
    Dying,
    /// Ready to be dropped by the owner
    Removed,
}

impl BehaviorState {
    /// Fieldless tag of this state.
    #[must_use]
    pub const fn kind(&self) -> BehaviorKind {
        match self {
            Self::Roaming => BehaviorKind::Roaming,
            Self::Detecting => BehaviorKind::Detecting,
            Self::Chasing => BehaviorKind::Chasing,
            Self::WindingUp { .. } => BehaviorKind::WindingUp,
            Self::HitStun { .. } => BehaviorKind::HitStun,
            Self::Celebrating { .. } => BehaviorKind::Celebrating,
            Self::FallingBack { .. } => BehaviorKind::FallingBack,
            Self::Dying => BehaviorKind::Dying,
            Self::Removed => BehaviorKind::Removed,
        }
    }
}

/// Behavior state tag for renderers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Roaming
    Roaming,
    /// Detecting
    Detecting,
    /// Chasing
    Chasing,
    /// Winding up
    WindingUp,
    /// Hit-stun
    HitStun,
    /// Celebrating
    Celebrating,
    /// Falling back
    FallingBack,
    /// Dying
    Dying,
    /// Removed
    Removed,
}

/// An autonomous enemy.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    name: String,
    stats: AgentStats,
    hp: u32,
    tile: TileCoord,
    target_tile: TileCoord,
    pixel: Vec2,
    aim: Aim,
    state: BehaviorState,
    state_entered_at: Timestamp,
    chase_deadline: Timestamp,
    alerted: bool,
    knockback: Knockback,
    immunity: Immunity,
    path: PathCache,
    unreachable_strikes: u32,
    last_attack_at: Option<Timestamp>,
    tuning: Arc<AgentTuning>,
    rng: fastrand::Rng,
    events: Vec<AgentEvent>,
}

impl Agent {
    /// Creates a roaming agent standing on `tile`.
    #[must_use]
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        stats: AgentStats,
        tile: TileCoord,
        tuning: Arc<AgentTuning>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            hp: stats.max_hp,
            stats,
            tile,
            target_tile: tile,
            pixel: tile.to_pixel(tuning.tile_size),
            aim: Aim::default(),
            state: BehaviorState::Roaming,
            state_entered_at: Timestamp::ZERO,
            chase_deadline: Timestamp::ZERO,
            alerted: true,
            knockback: Knockback::new(),
            immunity: Immunity::new(),
            path: PathCache::new(),
            unreachable_strikes: 0,
            last_attack_at: None,
            tuning,
            rng: fastrand::Rng::new(),
            events: Vec::new(),
        }
    }

    /// Reseeds the agent's random source (roaming and retreat jitter).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Advances the agent by one tick.
    pub fn update(
        &mut self,
        now: Timestamp,
        world: &Surroundings<'_>,
        dispatcher: &mut dyn CombatDispatcher,
    ) {
        match self.state {
            BehaviorState::Removed => return,
            BehaviorState::Dying => {
                if self.elapsed_in_state(now) >= self.tuning.dying() {
                    self.set_state(BehaviorState::Removed, now);
                    debug!("{} ({}) ready for removal", self.name, self.id);
                    self.emit(AgentEvent::Removed { agent: self.id });
                }
                return;
            },
            _ => {},
        }

        self.immunity.refresh(now);
        self.finish_hit_stun(now);

        if self.knockback.is_active() {
            self.step_knockback(now, world.grid);
            return;
        }

        if self.run_timed_state(now, world, dispatcher).is_break() {
            return;
        }

        if self.state == BehaviorState::Roaming && self.detect(now, world).is_break() {
            return;
        }

        if self.state == BehaviorState::Chasing && self.pursue(now, world).is_break() {
            return;
        }

        if self.state == BehaviorState::Roaming {
            self.roam(world.grid);
        }

        self.advance();

        if self.state == BehaviorState::Chasing {
            if let Some(target) = world.target {
                self.aim_at(target.pixel);
            }
        }
    }

    /// Applies a hit of `amount` before defense. Returns whether the agent
    /// is still alive.
    ///
    /// Immunity is not consulted here; hitters check [`Agent::is_immune`].
    /// Dying agents ignore damage. A survivor that is not already stunned
    /// enters hit-stun with the default immunity.
    pub fn take_damage(&mut self, amount: u32, now: Timestamp) -> bool {
        if self.is_dying() {
            return false;
        }

        let dealt = self.stats.mitigate(amount);
        self.hp = self.hp.saturating_sub(dealt);
        trace!("{} took {} damage, {} HP left", self.id, dealt, self.hp);

        if self.hp == 0 {
            self.start_dying(now);
            return false;
        }

        if !self.is_stunned() {
            self.trigger_hit_stun(now, self.tuning.hit_stun());
        }
        true
    }

    /// Arms a push of `distance` pixels along `direction` at `speed` px/tick.
    pub fn trigger_knockback(&mut self, direction: Vec2, distance: f32, speed: f32) {
        if self.is_dying() {
            return;
        }
        self.knockback.apply(direction, distance, speed);
    }

    /// Enters hit-stun. Immunity covers `base_immunity` now and is stretched
    /// past the stun when it ends.
    pub fn trigger_hit_stun(&mut self, now: Timestamp, base_immunity: Duration) {
        if self.is_dying() {
            return;
        }
        let was_chasing = self.pursuit_intent();
        let immunity_until = now + base_immunity + self.tuning.hit_stun_immunity_extension();
        self.immunity.arm_for(now, base_immunity);
        self.set_state(
            BehaviorState::HitStun {
                was_chasing,
                immunity_until,
            },
            now,
        );
        debug!("{} stunned", self.id);
        self.emit(AgentEvent::HitStunStarted {
            agent: self.id,
            until: now + self.tuning.hit_stun(),
        });
    }

    /// Enters celebrating with a short immunity window.
    ///
    /// Ignored while dying or stunned; a stun always runs to its end.
    pub fn trigger_celebratory(&mut self, now: Timestamp) {
        if self.is_dying() || self.is_stunned() {
            return;
        }
        let resume_chase = self.pursuit_intent();
        self.immunity.arm_for(now, self.tuning.celebrate_immunity());
        self.set_state(BehaviorState::Celebrating { resume_chase }, now);
        debug!("{} celebrating", self.id);
    }

    /// Backs away from `target`, or jitters randomly if there is none or it
    /// overlaps the agent. Ignored while dying or stunned.
    pub fn trigger_fallback(&mut self, now: Timestamp, target: Option<&TargetSnapshot>) {
        if self.is_dying() || self.is_stunned() {
            return;
        }
        let resume_chase = self.pursuit_intent();
        let retreat = self.retreat_point(target);
        self.path.clear();
        self.set_state(
            BehaviorState::FallingBack {
                resume_chase,
                retreat,
            },
            now,
        );
        debug!("{} falling back toward {}", self.id, retreat);
    }

    /// Starts an attack telegraph using the current aim. Returns false if the
    /// agent cannot wind up right now (dying, stunned, or already winding up).
    pub fn trigger_wind_up(&mut self, now: Timestamp) -> bool {
        match self.state {
            BehaviorState::Dying
            | BehaviorState::Removed
            | BehaviorState::HitStun { .. }
            | BehaviorState::WindingUp { .. } => return false,
            _ => {},
        }
        let resume_chase = self.pursuit_intent();
        let aim = self.aim;
        self.set_state(BehaviorState::WindingUp { resume_chase, aim }, now);
        self.chase_deadline += self.tuning.wind_up();
        self.emit(AgentEvent::WindUpStarted {
            agent: self.id,
            facing: aim.facing,
        });
        true
    }

    /// Attack the agent would release at `target` right now.
    #[must_use]
    pub fn preferred_attack(&self, target: Option<&TargetSnapshot>) -> AttackMode {
        let profile = &self.stats.profile;
        match target.map(|t| self.distance_in_tiles(t.pixel)) {
            Some(d) if profile.has_melee && d <= self.stats.melee_reach() => AttackMode::Melee,
            Some(d) if profile.has_projectile() && d <= self.stats.projectile_reach() => {
                AttackMode::Projectile
            },
            _ if profile.has_melee => AttackMode::Melee,
            _ => AttackMode::Projectile,
        }
    }

    /// Whether `target` is within the agent's longest attack reach.
    #[must_use]
    pub fn target_in_reach(&self, target: &TargetSnapshot) -> bool {
        self.distance_in_tiles(target.pixel) <= self.stats.attack_reach()
    }

    /// Whether the attack interval has passed since the last attack.
    #[must_use]
    pub fn can_attack(&self, now: Timestamp) -> bool {
        self.last_attack_at
            .map_or(true, |last| now.saturating_since(last) >= self.attack_interval())
    }

    /// Time spent in the current state.
    #[must_use]
    pub fn elapsed_in_state(&self, now: Timestamp) -> Duration {
        now.saturating_since(self.state_entered_at)
    }

    /// Takes buffered events.
    pub fn drain_events(&mut self) -> Vec<AgentEvent> {
        std::mem::take(&mut self.events)
    }

    // === Accessors ===

    /// Agent id.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Combat class.
    #[must_use]
    pub const fn class(&self) -> CombatClass {
        self.stats.class
    }

    /// Derived stats.
    #[must_use]
    pub const fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Current HP.
    #[must_use]
    pub const fn hp(&self) -> u32 {
        self.hp
    }

    /// Current HP over max HP.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.stats.max_hp == 0 {
            0.0
        } else {
            self.hp as f32 / self.stats.max_hp as f32
        }
    }

    /// Logical tile.
    #[must_use]
    pub const fn tile(&self) -> TileCoord {
        self.tile
    }

    /// Tile the body is sliding toward.
    #[must_use]
    pub const fn target_tile(&self) -> TileCoord {
        self.target_tile
    }

    /// Top-left pixel of the body.
    #[must_use]
    pub const fn pixel(&self) -> Vec2 {
        self.pixel
    }

    /// Center pixel of the body.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        body_center(self.pixel, self.tuning.tile_size)
    }

    /// Quantized facing.
    #[must_use]
    pub const fn facing(&self) -> Facing {
        self.aim.facing
    }

    /// Precise aim vector.
    #[must_use]
    pub const fn precise_aim(&self) -> Vec2 {
        self.aim.precise
    }

    /// Facing and precise aim together.
    #[must_use]
    pub const fn aim(&self) -> Aim {
        self.aim
    }

    /// Full behavior state.
    #[must_use]
    pub const fn state(&self) -> &BehaviorState {
        &self.state
    }

    /// Behavior state tag.
    #[must_use]
    pub const fn behavior(&self) -> BehaviorKind {
        self.state.kind()
    }

    /// When the current state began.
    #[must_use]
    pub const fn state_entered_at(&self) -> Timestamp {
        self.state_entered_at
    }

    /// Chase expiry.
    #[must_use]
    pub const fn chase_deadline(&self) -> Timestamp {
        self.chase_deadline
    }

    /// Whether the next sighting goes through the detecting pause.
    #[must_use]
    pub const fn is_alerted(&self) -> bool {
        self.alerted
    }

    /// Whether HP has hit zero (also true once removed).
    #[must_use]
    pub const fn is_dying(&self) -> bool {
        matches!(self.state, BehaviorState::Dying | BehaviorState::Removed)
    }

    /// Whether the agent is in hit-stun.
    #[must_use]
    pub const fn is_stunned(&self) -> bool {
        matches!(self.state, BehaviorState::HitStun { .. })
    }

    /// Whether the owner should drop this agent.
    #[must_use]
    pub const fn should_be_removed(&self) -> bool {
        matches!(self.state, BehaviorState::Removed)
    }

    /// Whether hits should be ignored.
    #[must_use]
    pub const fn is_immune(&self) -> bool {
        self.immunity.is_active()
    }

    /// Immunity window.
    #[must_use]
    pub const fn immunity(&self) -> &Immunity {
        &self.immunity
    }

    /// Knockback in progress, if any.
    #[must_use]
    pub const fn knockback(&self) -> &Knockback {
        &self.knockback
    }

    /// Cached chase path.
    #[must_use]
    pub const fn path(&self) -> &PathCache {
        &self.path
    }

    /// Consecutive failed path searches.
    #[must_use]
    pub const fn unreachable_strikes(&self) -> u32 {
        self.unreachable_strikes
    }

    /// Time of the last dispatched attack.
    #[must_use]
    pub const fn last_attack_at(&self) -> Option<Timestamp> {
        self.last_attack_at
    }

    /// Minimum time between attacks.
    #[must_use]
    pub fn attack_interval(&self) -> Duration {
        self.stats.profile.attack_interval()
    }

    /// Tuning this agent runs with.
    #[must_use]
    pub fn tuning(&self) -> &AgentTuning {
        &self.tuning
    }

    // === Transitions ===

    fn set_state(&mut self, state: BehaviorState, now: Timestamp) {
        self.state = state;
        self.state_entered_at = now;
    }

    fn emit(&mut self, event: AgentEvent) {
        self.events.push(event);
    }

    /// Whether the agent should be chasing once a temporary state ends.
    fn pursuit_intent(&self) -> bool {
        match self.state {
            BehaviorState::Detecting | BehaviorState::Chasing | BehaviorState::HitStun { .. } => {
                true
            },
            BehaviorState::WindingUp { resume_chase, .. }
            | BehaviorState::Celebrating { resume_chase }
            | BehaviorState::FallingBack { resume_chase, .. } => resume_chase,
            BehaviorState::Roaming | BehaviorState::Dying | BehaviorState::Removed => false,
        }
    }

    fn enter_chasing(&mut self, now: Timestamp) {
        self.set_state(BehaviorState::Chasing, now);
        self.chase_deadline = now + self.tuning.chase_window();
        self.unreachable_strikes = 0;
        debug!("{} chasing until {}", self.id, self.chase_deadline);
        self.emit(AgentEvent::ChaseStarted { agent: self.id });
    }

    fn enter_roaming(&mut self, now: Timestamp) {
        self.set_state(BehaviorState::Roaming, now);
        self.alerted = true;
    }

    fn resume(&mut self, resume_chase: bool, now: Timestamp) {
        if resume_chase {
            self.enter_chasing(now);
        } else {
            self.enter_roaming(now);
        }
    }

    fn abandon_chase(&mut self, reason: AbandonReason, now: Timestamp) {
        self.path.clear();
        self.unreachable_strikes = 0;
        self.enter_roaming(now);
        debug!("{} abandoned chase: {:?}", self.id, reason);
        self.emit(AgentEvent::ChaseAbandoned {
            agent: self.id,
            reason,
        });
    }

    fn start_dying(&mut self, now: Timestamp) {
        self.knockback.cancel();
        self.path.clear();
        self.set_state(BehaviorState::Dying, now);
        debug!("{} ({}) died at {}", self.name, self.id, self.tile);
        self.emit(AgentEvent::Died {
            agent: self.id,
            tile: self.tile,
        });
    }

    fn finish_hit_stun(&mut self, now: Timestamp) {
        if let BehaviorState::HitStun { immunity_until, .. } = self.state {
            if self.elapsed_in_state(now) >= self.tuning.hit_stun() {
                if immunity_until > now {
                    self.immunity.arm_until(immunity_until);
                }
                self.enter_chasing(now);
            }
        }
    }

    // === Per-tick phases ===

    fn step_knockback(&mut self, now: Timestamp, grid: Option<&dyn GridQuery>) {
        let Some(grid) = grid else {
            self.knockback.cancel();
            return;
        };
        let tile_size = self.tuning.tile_size;
        let step = self
            .knockback
            .tick(&mut self.pixel, &mut self.immunity, grid, now, tile_size);
        if !step.still_active() {
            let landed = TileCoord::from_pixel(self.pixel, tile_size);
            if grid.is_walkable(landed) {
                self.tile = landed;
                self.target_tile = landed;
            }
            self.path.clear();
        }
    }

    /// Runs timers of states that suspend normal behavior. Breaks when the
    /// rest of the tick should be skipped.
    fn run_timed_state(
        &mut self,
        now: Timestamp,
        world: &Surroundings<'_>,
        dispatcher: &mut dyn CombatDispatcher,
    ) -> ControlFlow<()> {
        let elapsed = self.elapsed_in_state(now);
        match self.state {
            BehaviorState::Roaming | BehaviorState::Chasing => ControlFlow::Continue(()),
            BehaviorState::Detecting => {
                if elapsed >= self.tuning.detection() {
                    self.enter_chasing(now);
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            },
            BehaviorState::WindingUp { resume_chase, aim } => {
                if elapsed >= self.tuning.wind_up() {
                    self.release_attack(now, aim, world.target.as_ref(), dispatcher);
                    self.resume(resume_chase, now);
                } else if let Some(target) = world.target {
                    // Visible aim tracks the target; the release uses `aim`.
                    self.aim_at(target.pixel);
                }
                ControlFlow::Break(())
            },
            BehaviorState::Celebrating { resume_chase } => {
                if elapsed >= self.tuning.celebrate() {
                    self.resume(resume_chase, now);
                }
                ControlFlow::Break(())
            },
            BehaviorState::FallingBack {
                resume_chase,
                retreat,
            } => {
                if elapsed >= self.tuning.fallback() || !self.retreat_step(retreat, world.grid) {
                    self.resume(resume_chase, now);
                }
                ControlFlow::Break(())
            },
            BehaviorState::HitStun { .. } | BehaviorState::Dying | BehaviorState::Removed => {
                ControlFlow::Break(())
            },
        }
    }

    /// Roaming agents look for the target. Breaks while detecting.
    fn detect(&mut self, now: Timestamp, world: &Surroundings<'_>) -> ControlFlow<()> {
        let (Some(grid), Some(target)) = (world.grid, world.target) else {
            return ControlFlow::Continue(());
        };
        if !target.alive
            || target.invisible
            || self.tile.manhattan_distance(target.tile) > self.stats.aggro_radius
            || !grid.has_line_of_sight(self.tile, target.tile)
        {
            return ControlFlow::Continue(());
        }

        if self.alerted {
            self.alerted = false;
            self.set_state(BehaviorState::Detecting, now);
            debug!("{} spotted target at {}", self.id, target.tile);
            self.emit(AgentEvent::Detected {
                agent: self.id,
                class: self.stats.class,
                target_critical: target.health_fraction <= self.tuning.critical_health_fraction,
            });
            ControlFlow::Break(())
        } else {
            self.enter_chasing(now);
            ControlFlow::Continue(())
        }
    }

    /// Chasing agents check their target and follow the path. Breaks when
    /// the chase is dropped and the agent should stand still this tick.
    fn pursue(&mut self, now: Timestamp, world: &Surroundings<'_>) -> ControlFlow<()> {
        let (Some(grid), Some(target)) = (world.grid, world.target) else {
            self.abandon_chase(AbandonReason::NoCollaborators, now);
            return ControlFlow::Continue(());
        };
        if target.invisible {
            self.abandon_chase(AbandonReason::TargetInvisible, now);
            return ControlFlow::Break(());
        }
        if !target.alive {
            self.abandon_chase(AbandonReason::TargetDead, now);
            return ControlFlow::Break(());
        }

        if now > self.chase_deadline {
            if self.tile.manhattan_distance(target.tile) <= self.stats.aggro_radius {
                self.chase_deadline = now + self.tuning.chase_window();
                trace!("{} chase extended to {}", self.id, self.chase_deadline);
            } else {
                self.abandon_chase(AbandonReason::OutOfRange, now);
                return ControlFlow::Continue(());
            }
        }

        self.follow_path(now, grid, target.tile);
        ControlFlow::Continue(())
    }

    fn follow_path(&mut self, now: Timestamp, grid: &dyn GridQuery, goal: TileCoord) {
        if self.path.needs_recompute(goal) {
            match find_path(grid, self.target_tile, goal) {
                Some(steps) if steps.is_empty() => {
                    self.unreachable_strikes = 0;
                    self.path.clear();
                },
                Some(steps) => {
                    self.unreachable_strikes = 0;
                    self.path.store(goal, steps);
                },
                None => {
                    self.unreachable_strikes += 1;
                    self.path.clear();
                    debug!(
                        "{} has no path to {} (strike {}/{})",
                        self.id, goal, self.unreachable_strikes, self.tuning.max_unreachable_strikes
                    );
                    if self.unreachable_strikes >= self.tuning.max_unreachable_strikes {
                        self.abandon_chase(AbandonReason::Unreachable, now);
                    }
                    return;
                },
            }
        }

        if !self.is_settled() {
            return;
        }
        if let Some(next) = self.path.pop() {
            if grid.is_walkable(next) && next.is_cardinal_neighbor(self.target_tile) {
                self.target_tile = next;
            } else {
                trace!("{} path blocked at {}", self.id, next);
                self.path.clear();
            }
        }
    }

    fn roam(&mut self, grid: Option<&dyn GridQuery>) {
        let Some(grid) = grid else {
            return;
        };
        if !self.is_settled() {
            return;
        }
        for _ in 0..ROAM_ATTEMPTS {
            let (dx, dy) = ALL_OFFSETS[self.rng.usize(..ALL_OFFSETS.len())];
            let next = self.target_tile.offset(dx, dy);
            if grid.is_walkable(next) {
                self.target_tile = next;
                if let Some(facing) = Facing::from_delta(dx, dy) {
                    self.aim = Aim::along(facing);
                }
                break;
            }
        }
    }

    /// Slides the body toward the target tile, snapping on arrival.
    fn advance(&mut self) {
        let goal = self.target_tile.to_pixel(self.tuning.tile_size);
        let delta = goal - self.pixel;
        let distance = delta.length();
        let mut speed = self.base_speed();
        if self.state == BehaviorState::Chasing {
            speed *= self.tuning.chase_speed_multiplier;
        }
        if distance > speed {
            self.pixel += delta / distance * speed;
        } else {
            self.pixel = goal;
            self.tile = self.target_tile;
        }
    }

    fn aim_at(&mut self, target_pixel: Vec2) {
        self.aim = Aim::toward(target_pixel - self.pixel, self.stats.profile.aim_policy());
    }

    fn release_attack(
        &mut self,
        now: Timestamp,
        aim: Aim,
        target: Option<&TargetSnapshot>,
        dispatcher: &mut dyn CombatDispatcher,
    ) {
        let origin = self.attack_origin(now);
        match self.preferred_attack(target) {
            AttackMode::Melee => {
                dispatcher.request_melee_attack(&origin, aim.facing);
                self.emit(AgentEvent::MeleeDispatched {
                    agent: self.id,
                    facing: aim.facing,
                });
            },
            AttackMode::Projectile => {
                dispatcher.request_projectile_attack(&origin, aim.precise);
                self.emit(AgentEvent::ProjectileDispatched {
                    agent: self.id,
                    aim: aim.precise,
                });
            },
        }
        self.last_attack_at = Some(now);
    }

    fn attack_origin(&self, now: Timestamp) -> AttackOrigin {
        let profile = &self.stats.profile;
        AttackOrigin {
            agent: self.id,
            class: self.stats.class,
            tile: self.tile,
            center: self.center(),
            attack: self.stats.attack,
            melee_reach: self.stats.melee_reach(),
            arc_degrees: profile.attack_width_degrees,
            projectile_speed: profile.projectile.map_or(0.0, |p| p.speed),
            projectile_reach: self.stats.projectile_reach(),
            at: now,
        }
    }

    fn retreat_point(&mut self, target: Option<&TargetSnapshot>) -> Vec2 {
        let tile_size = self.tuning.tile_size;
        let away = target.and_then(|t| (self.pixel - t.pixel).try_normalize());
        match away {
            Some(direction) => {
                self.pixel + direction * self.tuning.fallback_distance_tiles * tile_size
            },
            None => {
                let jitter = Vec2::new(self.rng.f32() - 0.5, self.rng.f32() - 0.5);
                self.pixel + jitter * tile_size
            },
        }
    }

    /// Moves toward the retreat point. Returns false if the way is blocked.
    fn retreat_step(&mut self, retreat: Vec2, grid: Option<&dyn GridQuery>) -> bool {
        let Some(grid) = grid else {
            return false;
        };
        let speed = self.base_speed() * self.tuning.fallback_speed_multiplier;
        let delta = retreat - self.pixel;
        let distance = delta.length();
        let next = if distance > speed {
            self.pixel + delta / distance * speed
        } else {
            retreat
        };

        let tile = TileCoord::from_pixel(next, self.tuning.tile_size);
        if !grid.is_walkable(tile) {
            trace!("{} retreat blocked at {}", self.id, tile);
            return false;
        }
        self.pixel = next;
        self.tile = tile;
        self.target_tile = tile;
        true
    }

    fn base_speed(&self) -> f32 {
        if self.stats.move_speed > 0.0 {
            self.stats.move_speed
        } else {
            self.tuning.default_move_speed
        }
    }

    fn is_settled(&self) -> bool {
        let goal = self.target_tile.to_pixel(self.tuning.tile_size);
        (self.pixel - goal).abs().max_element() < SETTLED_EPSILON
    }

    fn distance_in_tiles(&self, other_pixel: Vec2) -> f32 {
        (other_pixel - self.pixel).length() / self.tuning.tile_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::EnemyScaling;
    use crate::dispatch::{AttackKind, AttackQueue};
    use crate::grid::{MockGrid, TileGrid};

    const TS: f32 = 32.0;

    fn tuning() -> Arc<AgentTuning> {
        Arc::new(AgentTuning::default())
    }

    fn agent_at(class: CombatClass, x: i32, y: i32) -> Agent {
        let stats = AgentStats::enemy(class, &EnemyScaling::default());
        let id = AgentId::from_raw(1);
        Agent::new(id, "test", stats, TileCoord::new(x, y), tuning()).with_seed(7)
    }

    fn ms(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn target(x: i32, y: i32) -> TargetSnapshot {
        TargetSnapshot::at_tile(TileCoord::new(x, y), TS)
    }

    /// Puts an agent into a chase without going through detection.
    fn start_chase(agent: &mut Agent, world: &Surroundings<'_>, at: u64) {
        let mut queue = AttackQueue::new();
        agent.trigger_hit_stun(ms(at), Duration::ZERO);
        agent.update(ms(at + 2_200), world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
    }

    #[test]
    fn test_basic_chase_detects_then_steps() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 2));
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);

        agent.update(ms(0), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Detecting);
        assert!(!agent.is_alerted());
        assert_eq!(agent.target_tile(), TileCoord::new(5, 5));

        agent.update(ms(250), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Detecting);
        assert_eq!(agent.pixel(), TileCoord::new(5, 5).to_pixel(TS));

        agent.update(ms(500), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
        assert_eq!(agent.target_tile(), TileCoord::new(5, 4));
        assert_eq!(agent.chase_deadline(), ms(3_500));
        assert_eq!(agent.facing(), Facing::Up);

        let events = agent.drain_events();
        assert!(matches!(events[0], AgentEvent::Detected { target_critical: false, .. }));
        assert_eq!(events[1], AgentEvent::ChaseStarted { agent: agent.id() });
    }

    #[test]
    fn test_detection_needs_line_of_sight() {
        let grid = MockGrid::new(10, 10).with_los(false);
        let world = Surroundings::new(&grid, target(5, 3));
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        agent.update(ms(0), &world, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
    }

    #[test]
    fn test_detection_ignores_invisible_and_distant_targets() {
        let grid = MockGrid::new(10, 10);
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);

        let hidden = Surroundings::new(&grid, target(5, 4).with_invisible(true));
        agent.update(ms(0), &hidden, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);

        let far = Surroundings::new(&grid, target(9, 9));
        agent.update(ms(16), &far, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
    }

    #[test]
    fn test_critical_target_flagged_on_detection() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 4).with_health_fraction(0.2));
        let mut agent = agent_at(CombatClass::Rogue, 5, 5);
        agent.update(ms(0), &world, &mut AttackQueue::new());
        assert!(matches!(
            agent.drain_events()[0],
            AgentEvent::Detected {
                class: CombatClass::Rogue,
                target_critical: true,
                ..
            }
        ));
    }

    #[test]
    fn test_invisibility_breaks_chase() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 1));
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);
        assert!(!agent.path().is_empty());

        let hidden = Surroundings::new(&grid, target(5, 1).with_invisible(true));
        agent.update(ms(2_216), &hidden, &mut AttackQueue::new());

        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
        assert!(agent.path().is_empty());
        assert!(agent.is_alerted());
        assert!(agent.drain_events().contains(&AgentEvent::ChaseAbandoned {
            agent: agent.id(),
            reason: AbandonReason::TargetInvisible,
        }));
    }

    #[test]
    fn test_dead_target_breaks_chase() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 1));
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);

        let dead = Surroundings::new(&grid, target(5, 1).with_alive(false));
        agent.update(ms(2_216), &dead, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
    }

    #[test]
    fn test_chase_deadline_extends_in_range() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 3));
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);
        assert_eq!(agent.chase_deadline(), ms(5_200));

        agent.update(ms(5_201), &world, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
        assert_eq!(agent.chase_deadline(), ms(8_201));
    }

    #[test]
    fn test_chase_deadline_abandons_out_of_range() {
        let grid = MockGrid::new(20, 20);
        let world = Surroundings::new(&grid, target(15, 15));
        let mut agent = agent_at(CombatClass::Warrior, 2, 2);
        start_chase(&mut agent, &world, 0);

        agent.update(ms(5_201), &world, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
        assert!(agent.drain_events().contains(&AgentEvent::ChaseAbandoned {
            agent: agent.id(),
            reason: AbandonReason::OutOfRange,
        }));
    }

    #[test]
    fn test_unreachable_strikes_abandon() {
        let grid = TileGrid::from_ascii(
            "
            #######
            #..#..#
            #..#..#
            #######
            ",
        )
        .unwrap();
        let world = Surroundings::new(&grid, target(5, 1));
        let mut agent = agent_at(CombatClass::Warrior, 1, 1);
        let start = agent.pixel();

        start_chase(&mut agent, &world, 0);
        assert_eq!(agent.unreachable_strikes(), 1);

        agent.update(ms(2_216), &world, &mut AttackQueue::new());
        assert_eq!(agent.unreachable_strikes(), 2);
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
        assert_eq!(agent.pixel(), start);

        agent.update(ms(2_232), &world, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
        assert_eq!(agent.unreachable_strikes(), 0);
    }

    #[test]
    fn test_blocked_step_clears_path_and_reroutes() {
        let mut grid = MockGrid::new(10, 10);
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        let mut now = 2_200;
        {
            let world = Surroundings::new(&grid, target(5, 1));
            start_chase(&mut agent, &world, 0);
            while agent.tile() != TileCoord::new(5, 4) && now < 3_000 {
                now += 16;
                agent.update(ms(now), &world, &mut queue);
            }
        }
        assert_eq!(agent.tile(), TileCoord::new(5, 4));
        assert_eq!(agent.path().peek(), Some(TileCoord::new(5, 3)));

        // The cached next step turns into a wall.
        grid.block(5, 3);
        let world = Surroundings::new(&grid, target(5, 1));
        agent.update(ms(now + 16), &world, &mut queue);
        assert!(agent.path().is_empty());
        assert_eq!(agent.target_tile(), TileCoord::new(5, 4));
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);

        agent.update(ms(now + 32), &world, &mut queue);
        let step = agent.target_tile();
        assert!(step == TileCoord::new(4, 4) || step == TileCoord::new(6, 4));
        assert_eq!(agent.path().len(), 4);
        assert!(agent.path().steps().all(|tile| grid.is_walkable(*tile)));
        assert_eq!(agent.unreachable_strikes(), 0);
    }

    #[test]
    fn test_hit_stun_resumes_chase() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 1));
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);

        assert!(agent.take_damage(30, ms(3_000)));
        assert_eq!(agent.hp(), 124);
        assert_eq!(agent.behavior(), BehaviorKind::HitStun);
        assert!(agent.is_immune());

        agent.update(ms(5_199), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::HitStun);

        agent.update(ms(5_200), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
        assert_eq!(agent.chase_deadline(), ms(8_200));
        assert!(agent.is_immune());
        assert_eq!(agent.immunity().ends_at(), ms(6_000));

        agent.update(ms(6_000), &world, &mut queue);
        assert!(!agent.is_immune());
    }

    #[test]
    fn test_hit_stun_from_roaming_starts_chase() {
        let grid = MockGrid::new(20, 20);
        let world = Surroundings::new(&grid, target(18, 18));
        let mut agent = agent_at(CombatClass::Mage, 2, 2);
        agent.trigger_hit_stun(ms(0), Duration::from_millis(500));
        assert!(matches!(
            agent.state(),
            BehaviorState::HitStun {
                was_chasing: false,
                ..
            }
        ));

        agent.update(ms(2_200), &world, &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
    }

    #[test]
    fn test_stunned_agent_does_not_restun() {
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        assert!(agent.take_damage(20, ms(0)));
        let entered = agent.state_entered_at();
        assert!(agent.take_damage(20, ms(1_000)));
        assert_eq!(agent.state_entered_at(), entered);
    }

    #[test]
    fn test_defense_absorbs_small_hits() {
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        let hp = agent.hp();
        assert!(agent.take_damage(5, ms(0)));
        assert_eq!(agent.hp(), hp);
    }

    #[test]
    fn test_dying_is_idempotent() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 4));
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Ranger, 5, 5);

        assert!(!agent.take_damage(1_000, ms(100)));
        assert!(agent.is_dying());
        assert_eq!(agent.state_entered_at(), ms(100));

        assert!(!agent.take_damage(1_000, ms(900)));
        agent.trigger_hit_stun(ms(900), Duration::from_secs(1));
        agent.trigger_celebratory(ms(900));
        agent.trigger_knockback(Vec2::X, 64.0, 8.0);
        assert!(!agent.trigger_wind_up(ms(900)));
        assert_eq!(agent.behavior(), BehaviorKind::Dying);
        assert_eq!(agent.state_entered_at(), ms(100));
        assert!(!agent.knockback().is_active());

        let pixel = agent.pixel();
        agent.update(ms(2_099), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Dying);
        assert_eq!(agent.pixel(), pixel);
        assert!(!agent.should_be_removed());

        agent.update(ms(2_100), &world, &mut queue);
        assert!(agent.should_be_removed());
        assert!(agent.is_dying());

        let died = agent
            .drain_events()
            .iter()
            .filter(|e| matches!(e, AgentEvent::Died { .. }))
            .count();
        assert_eq!(died, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_knockback_suspends_movement_and_hits_wall() {
        let mut grid = MockGrid::new(10, 10);
        grid.block(3, 2);
        let world = Surroundings::grid_only(&grid);
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 2, 2);

        agent.trigger_hit_stun(ms(0), Duration::from_millis(1_000));
        agent.trigger_knockback(Vec2::X, 48.0, 16.0);

        agent.update(ms(0), &world, &mut queue);
        assert_eq!(agent.pixel(), Vec2::new(80.0, 64.0));
        assert!(agent.knockback().is_active());

        agent.update(ms(100), &world, &mut queue);
        assert!(!agent.knockback().is_active());
        assert_eq!(agent.pixel(), Vec2::new(80.0, 64.0));
        assert_eq!(agent.target_tile(), TileCoord::new(2, 2));
        // 900ms left at impact, half of it added
        assert_eq!(agent.immunity().ends_at(), ms(1_450));
    }

    #[test]
    fn test_knockback_settles_on_landing_tile() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::grid_only(&grid);
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 2, 2);

        agent.trigger_knockback(Vec2::new(0.0, 1.0), 40.0, 20.0);
        agent.update(ms(0), &world, &mut queue);
        agent.update(ms(16), &world, &mut queue);
        assert!(!agent.knockback().is_active());
        assert_eq!(agent.pixel(), Vec2::new(64.0, 104.0));
        assert_eq!(agent.tile(), TileCoord::new(2, 3));
        assert_eq!(agent.target_tile(), TileCoord::new(2, 3));
    }

    #[test]
    fn test_wind_up_releases_captured_aim() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 4));
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);
        assert_eq!(agent.facing(), Facing::Up);
        let deadline = agent.chase_deadline();

        assert!(agent.trigger_wind_up(ms(2_300)));
        assert!(!agent.trigger_wind_up(ms(2_310)));
        assert_eq!(agent.chase_deadline(), deadline + Duration::from_millis(500));

        // Target sidesteps; the telegraphed direction still wins.
        let moved = Surroundings::new(&grid, target(6, 5));
        let pixel = agent.pixel();
        agent.update(ms(2_799), &moved, &mut queue);
        assert!(queue.is_empty());
        assert_eq!(agent.pixel(), pixel);
        assert_eq!(agent.facing(), Facing::Right);

        agent.update(ms(2_800), &moved, &mut queue);
        let intents = queue.drain();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, AttackKind::Melee { facing: Facing::Up });
        assert_eq!(agent.last_attack_at(), Some(ms(2_800)));
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
        assert!(!agent.can_attack(ms(2_800)));
    }

    #[test]
    fn test_hit_cancels_wind_up() {
        let mut agent = agent_at(CombatClass::Rogue, 5, 5);
        assert!(agent.trigger_wind_up(ms(0)));
        assert!(agent.take_damage(30, ms(100)));
        assert_eq!(agent.behavior(), BehaviorKind::HitStun);

        let grid = MockGrid::new(10, 10);
        let mut queue = AttackQueue::new();
        agent.update(ms(600), &Surroundings::grid_only(&grid), &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_preferred_attack_by_distance() {
        let mage = agent_at(CombatClass::Mage, 5, 5);
        assert_eq!(mage.preferred_attack(Some(&target(5, 4))), AttackMode::Melee);
        assert_eq!(mage.preferred_attack(Some(&target(5, 0))), AttackMode::Projectile);
        assert_eq!(mage.preferred_attack(Some(&target(5, 20))), AttackMode::Melee);
        assert_eq!(mage.preferred_attack(None), AttackMode::Melee);

        let ranger = agent_at(CombatClass::Ranger, 5, 5);
        assert_eq!(ranger.preferred_attack(Some(&target(5, 4))), AttackMode::Projectile);
        assert_eq!(ranger.preferred_attack(None), AttackMode::Projectile);
    }

    #[test]
    fn test_ranger_fires_precise_vector() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(8, 1));
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Ranger, 5, 5);
        start_chase(&mut agent, &world, 0);

        assert!(agent.trigger_wind_up(ms(2_300)));
        agent.update(ms(2_800), &world, &mut queue);

        let intents = queue.drain();
        let AttackKind::Projectile { aim } = intents[0].kind else {
            panic!("ranger should shoot");
        };
        assert!((aim.length() - 1.0).abs() < 1e-5);
        assert!(aim.x > 0.0 && aim.y < 0.0);
        assert_eq!(agent.facing(), Facing::UpRight);
    }

    #[test]
    fn test_celebrating_grants_immunity_and_resumes() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 2));
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);

        agent.trigger_celebratory(ms(2_300));
        assert!(agent.is_immune());
        assert_eq!(agent.behavior(), BehaviorKind::Celebrating);

        agent.update(ms(2_800), &world, &mut queue);
        assert!(!agent.is_immune());
        assert_eq!(agent.behavior(), BehaviorKind::Celebrating);

        agent.update(ms(4_300), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
        assert_eq!(agent.chase_deadline(), ms(7_300));
    }

    #[test]
    fn test_celebrating_from_roaming_returns_to_roaming() {
        let mut agent = agent_at(CombatClass::Rogue, 5, 5);
        agent.trigger_celebratory(ms(0));
        agent.update(ms(2_000), &Surroundings::default(), &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
    }

    #[test]
    fn test_fallback_moves_away_then_resumes() {
        let grid = MockGrid::new(10, 10);
        let player = target(5, 4);
        let world = Surroundings::new(&grid, player);
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);

        let before = agent.pixel();
        agent.trigger_fallback(ms(2_300), Some(&player));
        let BehaviorState::FallingBack { retreat, .. } = *agent.state() else {
            panic!("expected fallback");
        };
        // 1.5 tiles straight away from the player
        assert!((retreat - (before + Vec2::new(0.0, 48.0))).length() < 1e-3);

        agent.update(ms(2_316), &world, &mut queue);
        assert!(agent.pixel().y > before.y);
        assert_eq!(agent.pixel().x, before.x);

        agent.update(ms(3_500), &world, &mut queue);
        assert_eq!(agent.behavior(), BehaviorKind::Chasing);
    }

    #[test]
    fn test_fallback_stops_at_wall() {
        let grid = MockGrid::new(10, 7);
        let player = target(5, 5);
        let world = Surroundings::new(&grid, player);
        let mut agent = agent_at(CombatClass::Warrior, 5, 6);

        agent.trigger_fallback(ms(0), Some(&player));
        let mut now = 0;
        while agent.behavior() == BehaviorKind::FallingBack && now < 1_200 {
            now += 1;
            agent.update(ms(now), &world, &mut AttackQueue::new());
        }
        assert!(now < 1_200);
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
        assert_eq!(agent.tile().y, 6);
    }

    #[test]
    fn test_roaming_steps_to_walkable_neighbor() {
        let mut grid = MockGrid::new(3, 3);
        for (x, y) in [(0, 0), (1, 0), (2, 0), (0, 1), (2, 1), (0, 2), (2, 2)] {
            grid.block(x, y);
        }
        let world = Surroundings::grid_only(&grid);
        let mut agent = agent_at(CombatClass::Rogue, 1, 1);

        for tick in 0..32 {
            if agent.target_tile() != TileCoord::new(1, 1) {
                break;
            }
            agent.update(ms(tick * 16), &world, &mut AttackQueue::new());
        }
        assert_eq!(agent.target_tile(), TileCoord::new(1, 2));
        assert_eq!(agent.facing(), Facing::Down);
        assert!(agent.pixel().y > 32.0);
    }

    #[test]
    fn test_no_collaborators_stays_put() {
        let mut agent = agent_at(CombatClass::Warrior, 3, 3);
        let pixel = agent.pixel();
        agent.update(ms(0), &Surroundings::default(), &mut AttackQueue::new());
        assert_eq!(agent.behavior(), BehaviorKind::Roaming);
        assert_eq!(agent.pixel(), pixel);
    }

    #[test]
    fn test_pixel_converges_before_next_step() {
        let grid = MockGrid::new(10, 10);
        let world = Surroundings::new(&grid, target(5, 1));
        let mut queue = AttackQueue::new();
        let mut agent = agent_at(CombatClass::Warrior, 5, 5);
        start_chase(&mut agent, &world, 0);
        assert_eq!(agent.target_tile(), TileCoord::new(5, 4));

        let mut now = 2_200;
        let mut previous = agent.target_tile();
        for _ in 0..40 {
            now += 16;
            let settled_before = agent.pixel() == previous.to_pixel(TS);
            agent.update(ms(now), &world, &mut queue);
            if agent.target_tile() != previous {
                assert!(settled_before);
                assert!(agent.target_tile().is_cardinal_neighbor(previous));
                previous = agent.target_tile();
            }
        }
        assert!(previous.y < 4);
    }
}
