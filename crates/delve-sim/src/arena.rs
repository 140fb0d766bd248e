//! Scripted arena: one stationary player against an encounter.
//!
//! The arena plays the part of the game around the combat core. It resolves
//! the attack intents agents dispatch, swings back at adjacent agents, and
//! turns the player invisible for a scripted window.

use delve_common::{DelveError, DelveResult, TileCoord, Timestamp};
use delve_gameplay::{
    AgentEvent, AgentTuning, AttackIntent, AttackKind, AttackQueue, CombatClass, Encounter,
    GridQuery, TargetSnapshot, TileGrid,
};
use glam::Vec2;
use std::time::Duration;
use tracing::{debug, info};

/// Player hit points.
const PLAYER_MAX_HP: u32 = 100;
/// Damage of one player swing.
const PLAYER_ATTACK: u32 = 30;
/// Time between player swings.
const PLAYER_SWING: Duration = Duration::from_millis(600);
/// Player swing reach in tiles.
const PLAYER_REACH: f32 = 1.5;
/// Knockback of a player swing: distance and speed in pixels.
const PLAYER_KNOCKBACK: (f32, f32) = (24.0, 6.0);
/// Half-width of the cone a projectile has to fly through to hit.
const PROJECTILE_TOLERANCE_DEGREES: f32 = 10.0;

/// The stationary target agents fight.
#[derive(Debug, Clone)]
pub struct Player {
    tile: TileCoord,
    hp: u32,
    last_swing: Option<Timestamp>,
    invisible: Option<(Timestamp, Timestamp)>,
}

impl Player {
    fn new(tile: TileCoord) -> Self {
        Self {
            tile,
            hp: PLAYER_MAX_HP,
            last_swing: None,
            invisible: None,
        }
    }

    /// Current HP.
    pub const fn hp(&self) -> u32 {
        self.hp
    }

    /// Whether the player is still standing.
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    fn is_invisible(&self, now: Timestamp) -> bool {
        self.invisible
            .is_some_and(|(from, until)| now >= from && now < until)
    }

    fn snapshot(&self, now: Timestamp, tile_size: f32) -> TargetSnapshot {
        TargetSnapshot::at_tile(self.tile, tile_size)
            .with_alive(self.is_alive())
            .with_invisible(self.is_invisible(now))
            .with_health_fraction(self.hp as f32 / PLAYER_MAX_HP as f32)
    }
}

/// Totals gathered over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Ticks simulated
    pub ticks: u64,
    /// Attack intents dispatched by agents
    pub attacks: u64,
    /// Intents that hit the player
    pub hits_taken: u64,
    /// Player swings that connected
    pub hits_dealt: u64,
    /// Agents removed after dying
    pub kills: u64,
    /// Whether the player was defeated
    pub player_defeated: bool,
}

/// Map, player, and encounter.
#[derive(Debug)]
pub struct Arena {
    grid: TileGrid,
    encounter: Encounter,
    player: Player,
    queue: AttackQueue,
    tile_size: f32,
    summary: Summary,
}

impl Arena {
    /// Builds an arena from an ASCII map.
    ///
    /// `P` marks the player. Lowercase `w`, `m`, `r`, `a` spawn a warrior,
    /// mage, rogue, or ranger (archer); uppercase spawns a boss of that class.
    pub fn from_map(map: &str, tuning: AgentTuning, seed: u64) -> DelveResult<Self> {
        let (grid, markers) = TileGrid::parse_with_markers(map)?;
        let tile_size = tuning.tile_size;
        let mut encounter = Encounter::new(tuning).with_seed(seed);
        let mut player = None;

        for (glyph, tile) in markers {
            if glyph == 'P' {
                player = Some(Player::new(tile));
                continue;
            }
            let class = class_for(glyph).ok_or(DelveError::UnknownMarker { glyph, tile })?;
            if glyph.is_ascii_uppercase() {
                encounter.spawn_boss(class, tile);
            } else {
                encounter.spawn(class, tile);
            }
        }

        let player =
            player.ok_or_else(|| DelveError::Scenario("map has no player marker 'P'".into()))?;
        info!(
            "Arena {}x{} with {} agents, player at {}",
            grid.width(),
            grid.height(),
            encounter.len(),
            player.tile
        );

        Ok(Self {
            grid,
            encounter,
            player,
            queue: AttackQueue::new(),
            tile_size,
            summary: Summary::default(),
        })
    }

    /// Makes the player invisible between `from` and `until`.
    pub fn set_invisible_window(&mut self, from: Timestamp, until: Timestamp) {
        self.player.invisible = Some((from, until));
    }

    /// The player.
    pub const fn player(&self) -> &Player {
        &self.player
    }

    /// The encounter.
    pub const fn encounter(&self) -> &Encounter {
        &self.encounter
    }

    /// Runs `ticks` steps of `tick` each, starting at time zero.
    pub fn run(&mut self, ticks: u64, tick: Duration) -> Summary {
        let mut now = Timestamp::ZERO;
        for _ in 0..ticks {
            self.step(now);
            now += tick;
            if self.encounter.is_empty() {
                info!("All agents defeated at {}", now);
                break;
            }
        }
        self.summary.clone()
    }

    /// Advances everything by one tick at `now`.
    pub fn step(&mut self, now: Timestamp) {
        let target = self.player.snapshot(now, self.tile_size);
        self.encounter
            .update(now, Some(&self.grid), Some(target), &mut self.queue);

        for intent in self.queue.drain() {
            self.summary.attacks += 1;
            self.resolve(&intent, now);
        }

        self.player_swing(now);

        for event in self.encounter.drain_events() {
            log_event(&event);
        }
        self.summary.kills += self.encounter.remove_finished().len() as u64;
        self.summary.ticks += 1;
    }

    fn resolve(&mut self, intent: &AttackIntent, now: Timestamp) {
        if !self.player.is_alive() || self.player.is_invisible(now) {
            return;
        }
        let origin = &intent.origin;
        let to_player = body_center(self.player.tile, self.tile_size) - origin.center;
        let distance = to_player.length() / self.tile_size;

        let hit = match intent.kind {
            AttackKind::Melee { facing } => {
                distance <= origin.melee_reach
                    && angle_between(facing.unit_vector(), to_player) <= origin.arc_degrees / 2.0
            },
            AttackKind::Projectile { aim } => {
                distance <= origin.projectile_reach
                    && angle_between(aim, to_player) <= PROJECTILE_TOLERANCE_DEGREES
                    && self.grid.has_line_of_sight(origin.tile, self.player.tile)
            },
        };
        if !hit {
            debug!("{} missed", origin.agent);
            return;
        }

        self.player.hp = self.player.hp.saturating_sub(origin.attack);
        self.summary.hits_taken += 1;
        info!(
            "{} {} hit the player for {} ({} HP left)",
            origin.class, origin.agent, origin.attack, self.player.hp
        );

        if self.player.is_alive() {
            // Unknown ids only happen if the agent was despawned this tick.
            if let Err(e) = self.encounter.report_landed_hit(origin.agent, now) {
                debug!("Landed hit ignored: {e}");
            }
        } else {
            info!("Player defeated");
            self.summary.player_defeated = true;
            self.encounter.celebrate_all(now);
        }
    }

    fn player_swing(&mut self, now: Timestamp) {
        if !self.player.is_alive() {
            return;
        }
        if let Some(last) = self.player.last_swing {
            if now.saturating_since(last) < PLAYER_SWING {
                return;
            }
        }

        let center = body_center(self.player.tile, self.tile_size);
        let nearest = self
            .encounter
            .iter()
            .filter(|agent| !agent.is_dying())
            .map(|agent| (agent.id(), agent.center() - center))
            .filter(|(_, offset)| offset.length() / self.tile_size <= PLAYER_REACH)
            .min_by(|a, b| a.1.length().total_cmp(&b.1.length()));
        let Some((id, offset)) = nearest else {
            return;
        };

        self.player.last_swing = Some(now);
        match self.encounter.damage(id, PLAYER_ATTACK, now) {
            Ok(true) => {
                self.summary.hits_dealt += 1;
                if let Some(agent) = self.encounter.get_mut(id) {
                    let (distance, speed) = PLAYER_KNOCKBACK;
                    agent.trigger_knockback(offset, distance, speed);
                }
            },
            Ok(false) => debug!("{} shrugged off the swing", id),
            Err(e) => debug!("Swing ignored: {e}"),
        }
    }
}

fn class_for(glyph: char) -> Option<CombatClass> {
    match glyph.to_ascii_lowercase() {
        'w' => Some(CombatClass::Warrior),
        'm' => Some(CombatClass::Mage),
        'r' => Some(CombatClass::Rogue),
        'a' => Some(CombatClass::Ranger),
        _ => None,
    }
}

fn body_center(tile: TileCoord, tile_size: f32) -> Vec2 {
    delve_common::body_center(tile.to_pixel(tile_size), tile_size)
}

fn angle_between(a: Vec2, b: Vec2) -> f32 {
    if a == Vec2::ZERO || b == Vec2::ZERO {
        return 0.0;
    }
    a.angle_between(b).abs().to_degrees()
}

fn log_event(event: &AgentEvent) {
    match event {
        AgentEvent::Detected {
            agent,
            class,
            target_critical,
        } => {
            if *target_critical {
                info!("{class} {agent} spotted the player, who is nearly dead");
            } else {
                info!("{class} {agent} spotted the player");
            }
        },
        AgentEvent::ChaseAbandoned { agent, reason } => {
            info!("{agent} gave up the chase ({reason:?})");
        },
        AgentEvent::Died { agent, tile } => info!("{agent} died at {tile}"),
        AgentEvent::Removed { agent } => info!("{agent} removed"),
        other => debug!("{other:?}"),
    }
}
