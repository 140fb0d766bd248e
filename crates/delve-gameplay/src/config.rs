//! Agent tuning.
//!
//! Every timing, speed, and scaling factor the combat core uses lives here.
//! Tuning is loaded from a TOML file; missing keys fall back to the stock
//! values.

use crate::class::{BossModifiers, EnemyScaling};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from loading or saving tuning files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// File is not valid tuning TOML
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Tuning could not be encoded
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for tuning operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Timings and factors for agent behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTuning {
    // === Geometry ===
    /// Tile edge in pixels
    pub tile_size: f32,

    // === State durations (ms) ===
    /// Detecting pause before a chase
    pub detection_ms: u64,
    /// Chase deadline window, re-armed while the target stays in range
    pub chase_window_ms: u64,
    /// Attack telegraph
    pub wind_up_ms: u64,
    /// Default hit-stun length
    pub hit_stun_ms: u64,
    /// Immunity grace past the end of hit-stun
    pub hit_stun_immunity_extension_ms: u64,
    /// Celebrating length
    pub celebrate_ms: u64,
    /// Immunity at the start of celebrating
    pub celebrate_immunity_ms: u64,
    /// Falling back length
    pub fallback_ms: u64,
    /// Death grace window before removal
    pub dying_ms: u64,

    // === Movement ===
    /// Speed used when an agent has no move speed of its own (px/tick)
    pub default_move_speed: f32,
    /// Speed multiplier while chasing
    pub chase_speed_multiplier: f32,
    /// Speed multiplier while falling back
    pub fallback_speed_multiplier: f32,
    /// Retreat distance from the target in tiles
    pub fallback_distance_tiles: f32,

    // === Behavior ===
    /// Chance of celebrating after a landed hit (0.0 - 1.0)
    pub celebrate_after_hit_chance: f32,
    /// Consecutive unreachable paths before a chase is abandoned
    pub max_unreachable_strikes: u32,
    /// Player health fraction considered critical for detection events
    pub critical_health_fraction: f32,

    // === Scaling ===
    /// Multipliers for every enemy
    pub enemy: EnemyScaling,
    /// Extra multipliers for bosses
    pub boss: BossModifiers,

    // === Events ===
    /// Event bus capacity
    pub event_capacity: usize,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            tile_size: 32.0,

            detection_ms: 500,
            chase_window_ms: 3_000,
            wind_up_ms: 500,
            hit_stun_ms: 2_200,
            hit_stun_immunity_extension_ms: 800,
            celebrate_ms: 2_000,
            celebrate_immunity_ms: 500,
            fallback_ms: 1_200,
            dying_ms: 2_000,

            default_move_speed: 2.5,
            chase_speed_multiplier: 1.1,
            fallback_speed_multiplier: 0.8,
            fallback_distance_tiles: 1.5,

            celebrate_after_hit_chance: 0.25,
            max_unreachable_strikes: 3,
            critical_health_fraction: 0.25,

            enemy: EnemyScaling::default(),
            boss: BossModifiers::default(),

            event_capacity: 1024,
        }
    }
}

impl AgentTuning {
    /// Loads tuning from a TOML file and clamps it.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut tuning: Self = toml::from_str(&contents)?;
        tuning.validate();
        info!("Loaded agent tuning from {}", path.display());
        Ok(tuning)
    }

    /// Loads tuning, falling back to defaults if the file is missing or bad.
    #[must_use]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Tuning file {} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(tuning) => tuning,
            Err(e) => {
                warn!("Failed to load tuning from {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Saves tuning as pretty TOML, creating parent directories.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        info!("Saved agent tuning to {}", path.display());
        Ok(())
    }

    /// Clamps values to sensible ranges.
    pub fn validate(&mut self) {
        self.tile_size = self.tile_size.clamp(4.0, 256.0);

        self.detection_ms = self.detection_ms.min(10_000);
        self.chase_window_ms = self.chase_window_ms.clamp(100, 60_000);
        self.wind_up_ms = self.wind_up_ms.min(10_000);
        self.hit_stun_ms = self.hit_stun_ms.min(10_000);
        self.hit_stun_immunity_extension_ms = self.hit_stun_immunity_extension_ms.min(10_000);
        self.celebrate_ms = self.celebrate_ms.min(10_000);
        self.celebrate_immunity_ms = self.celebrate_immunity_ms.min(self.celebrate_ms);
        self.fallback_ms = self.fallback_ms.min(10_000);
        self.dying_ms = self.dying_ms.min(60_000);

        self.default_move_speed = self.default_move_speed.clamp(0.1, self.tile_size);
        self.chase_speed_multiplier = self.chase_speed_multiplier.clamp(0.1, 4.0);
        self.fallback_speed_multiplier = self.fallback_speed_multiplier.clamp(0.1, 4.0);
        self.fallback_distance_tiles = self.fallback_distance_tiles.clamp(0.0, 16.0);

        self.celebrate_after_hit_chance = self.celebrate_after_hit_chance.clamp(0.0, 1.0);
        self.max_unreachable_strikes = self.max_unreachable_strikes.clamp(1, 100);
        self.critical_health_fraction = self.critical_health_fraction.clamp(0.0, 1.0);

        self.enemy.hp = self.enemy.hp.clamp(0.01, 100.0);
        self.enemy.attack = self.enemy.attack.clamp(0.0, 100.0);
        self.enemy.move_speed = self.enemy.move_speed.clamp(0.01, 10.0);
        self.enemy.aggro_radius = self.enemy.aggro_radius.min(64);
        self.boss.hp = self.boss.hp.clamp(0.01, 100.0);
        self.boss.attack = self.boss.attack.clamp(0.0, 100.0);
        self.boss.move_speed = self.boss.move_speed.clamp(0.01, 10.0);
        self.boss.range = self.boss.range.clamp(0.01, 10.0);
        self.boss.vision = self.boss.vision.clamp(0.0, 10.0);
        self.boss.size = self.boss.size.clamp(0.1, 10.0);

        self.event_capacity = self.event_capacity.clamp(16, 1 << 20);
    }

    /// Detecting pause.
    #[must_use]
    pub const fn detection(&self) -> Duration {
        Duration::from_millis(self.detection_ms)
    }

    /// Chase deadline window.
    #[must_use]
    pub const fn chase_window(&self) -> Duration {
        Duration::from_millis(self.chase_window_ms)
    }

    /// Wind-up length.
    #[must_use]
    pub const fn wind_up(&self) -> Duration {
        Duration::from_millis(self.wind_up_ms)
    }

    /// Default hit-stun length.
    #[must_use]
    pub const fn hit_stun(&self) -> Duration {
        Duration::from_millis(self.hit_stun_ms)
    }

    /// Immunity grace after hit-stun.
    #[must_use]
    pub const fn hit_stun_immunity_extension(&self) -> Duration {
        Duration::from_millis(self.hit_stun_immunity_extension_ms)
    }

    /// Celebrating length.
    #[must_use]
    pub const fn celebrate(&self) -> Duration {
        Duration::from_millis(self.celebrate_ms)
    }

    /// Immunity at the start of celebrating.
    #[must_use]
    pub const fn celebrate_immunity(&self) -> Duration {
        Duration::from_millis(self.celebrate_immunity_ms)
    }

    /// Falling back length.
    #[must_use]
    pub const fn fallback(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }

    /// Death grace window.
    #[must_use]
    pub const fn dying(&self) -> Duration {
        Duration::from_millis(self.dying_ms)
    }
}
