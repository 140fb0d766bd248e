//! Combat classes and derived agent stats.
//!
//! Every archetype runs the same state machine. Classes only differ by the
//! numbers in [`ClassProfile`], and bosses are regular agents with
//! [`BossModifiers`] folded into their [`AgentStats`] at spawn.

use crate::aiming::AimPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed combat archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatClass {
    /// Heavy melee
    Warrior,
    /// Short melee plus slow bolts
    Mage,
    /// Fast melee
    Rogue,
    /// Projectiles only
    Ranger,
}

impl CombatClass {
    /// All classes.
    pub const ALL: [Self; 4] = [Self::Warrior, Self::Mage, Self::Rogue, Self::Ranger];

    /// Base stat table for this class.
    #[must_use]
    pub const fn profile(self) -> ClassProfile {
        match self {
            Self::Warrior => ClassProfile {
                max_hp: 120,
                attack: 18,
                attack_speed: 1.12,
                range: 2.0,
                has_melee: true,
                projectile: None,
                move_speed: 3.5,
                defense: 10,
                attack_width_degrees: 120.0,
            },
            Self::Mage => ClassProfile {
                max_hp: 70,
                attack: 10,
                attack_speed: 1.4,
                range: 1.6,
                has_melee: true,
                projectile: Some(ProjectileProfile {
                    speed: 10.0,
                    travel_tiles: 8.0,
                }),
                move_speed: 4.0,
                defense: 2,
                attack_width_degrees: 100.0,
            },
            Self::Rogue => ClassProfile {
                max_hp: 80,
                attack: 14,
                attack_speed: 2.55,
                range: 1.4,
                has_melee: true,
                projectile: None,
                move_speed: 5.0,
                defense: 4,
                attack_width_degrees: 90.0,
            },
            Self::Ranger => ClassProfile {
                max_hp: 70,
                attack: 8,
                attack_speed: 2.5,
                range: 4.0,
                has_melee: false,
                projectile: Some(ProjectileProfile {
                    speed: 20.0,
                    travel_tiles: 8.0,
                }),
                move_speed: 4.5,
                defense: 1,
                attack_width_degrees: 20.0,
            },
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Warrior => "warrior",
            Self::Mage => "mage",
            Self::Rogue => "rogue",
            Self::Ranger => "ranger",
        }
    }
}

impl std::fmt::Display for CombatClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Projectile parameters of a class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileProfile {
    /// Pixels per tick
    pub speed: f32,
    /// Maximum travel in tiles
    pub travel_tiles: f32,
}

/// Base stats of a class before enemy scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProfile {
    /// Hit points
    pub max_hp: u32,
    /// Attack power
    pub attack: u32,
    /// Attacks per second
    pub attack_speed: f32,
    /// Melee range in tiles
    pub range: f32,
    /// Whether the class swings a melee arc
    pub has_melee: bool,
    /// Projectile, if the class shoots
    pub projectile: Option<ProjectileProfile>,
    /// Class move speed before enemy scaling
    pub move_speed: f32,
    /// Flat damage reduction
    pub defense: u32,
    /// Melee arc width
    pub attack_width_degrees: f32,
}

impl ClassProfile {
    /// Whether the class can shoot.
    #[must_use]
    pub const fn has_projectile(&self) -> bool {
        self.projectile.is_some()
    }

    /// Aim policy implied by the attack kinds.
    #[must_use]
    pub const fn aim_policy(&self) -> AimPolicy {
        AimPolicy::for_attacks(self.has_melee, self.has_projectile())
    }

    /// Minimum time between attacks, `1000 / attack_speed` ms.
    #[must_use]
    pub fn attack_interval(&self) -> Duration {
        if self.attack_speed > 0.0 {
            Duration::from_secs_f32(1.0 / self.attack_speed)
        } else {
            Duration::MAX
        }
    }
}

/// Multipliers applied to every enemy on top of its class profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyScaling {
    /// Hit point multiplier
    pub hp: f32,
    /// Attack multiplier
    pub attack: f32,
    /// Class move speed to pixels per tick
    pub move_speed: f32,
    /// Aggro radius in tiles (Manhattan)
    pub aggro_radius: u32,
}

impl Default for EnemyScaling {
    fn default() -> Self {
        Self {
            hp: 1.2,
            attack: 0.8,
            move_speed: 0.5,
            aggro_radius: 3,
        }
    }
}

/// Extra multipliers for boss agents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossModifiers {
    /// Hit point multiplier
    pub hp: f32,
    /// Attack multiplier
    pub attack: f32,
    /// Move speed multiplier
    pub move_speed: f32,
    /// Attack range multiplier
    pub range: f32,
    /// Aggro radius multiplier (result is rounded)
    pub vision: f32,
    /// Visual size multiplier, also scales attack reach
    pub size: f32,
}

impl Default for BossModifiers {
    fn default() -> Self {
        Self {
            hp: 1.5,
            attack: 1.5,
            move_speed: 0.8,
            range: 0.8,
            vision: 1.3,
            size: 2.0,
        }
    }
}

/// Final stats of a spawned agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Archetype
    pub class: CombatClass,
    /// Class base table
    pub profile: ClassProfile,
    /// Scaled hit points
    pub max_hp: u32,
    /// Scaled attack power
    pub attack: u32,
    /// Pixels per tick
    pub move_speed: f32,
    /// Detection radius in tiles (Manhattan)
    pub aggro_radius: u32,
    /// Visual size multiplier
    pub size: f32,
    /// Attack range multiplier
    pub range_modifier: f32,
    /// Whether the boss modifiers were applied
    pub is_boss: bool,
}

impl AgentStats {
    /// Stats of a regular enemy.
    #[must_use]
    pub fn enemy(class: CombatClass, scaling: &EnemyScaling) -> Self {
        let profile = class.profile();
        Self {
            class,
            profile,
            max_hp: scale(profile.max_hp, scaling.hp),
            attack: scale(profile.attack, scaling.attack),
            move_speed: profile.move_speed * scaling.move_speed,
            aggro_radius: scaling.aggro_radius,
            size: 1.0,
            range_modifier: 1.0,
            is_boss: false,
        }
    }

    /// Stats of a boss: a regular enemy with `boss` folded in.
    #[must_use]
    pub fn boss(class: CombatClass, scaling: &EnemyScaling, boss: &BossModifiers) -> Self {
        let base = Self::enemy(class, scaling);
        Self {
            max_hp: scale(base.max_hp, boss.hp),
            attack: scale(base.attack, boss.attack),
            move_speed: base.move_speed * boss.move_speed,
            aggro_radius: (base.aggro_radius as f32 * boss.vision).round() as u32,
            size: boss.size,
            range_modifier: boss.range,
            is_boss: true,
            ..base
        }
    }

    /// Melee reach in tiles, zero for classes without melee.
    #[must_use]
    pub fn melee_reach(&self) -> f32 {
        if self.profile.has_melee {
            self.profile.range * self.size * self.range_modifier
        } else {
            0.0
        }
    }

    /// Projectile reach in tiles, zero for classes without projectiles.
    #[must_use]
    pub fn projectile_reach(&self) -> f32 {
        self.profile
            .projectile
            .map_or(0.0, |p| p.travel_tiles * self.size * self.range_modifier)
    }

    /// Longest reach of any attack.
    #[must_use]
    pub fn attack_reach(&self) -> f32 {
        self.melee_reach().max(self.projectile_reach())
    }

    /// Damage taken from a hit of `amount` after defense.
    #[must_use]
    pub const fn mitigate(&self, amount: u32) -> u32 {
        amount.saturating_sub(self.profile.defense)
    }
}

fn scale(value: u32, factor: f32) -> u32 {
    (value as f32 * factor) as u32
}
