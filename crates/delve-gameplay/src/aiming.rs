//! Aiming: 8-way facing and precise projectile vectors.
//!
//! Angles are measured in screen space, so with `y` pointing down a positive
//! angle turns clockwise: 90° is [`Facing::Down`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// One of eight compass sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    /// 0°
    Right,
    /// 45°
    DownRight,
    /// 90°
    #[default]
    Down,
    /// 135°
    DownLeft,
    /// 180°
    Left,
    /// 225°
    UpLeft,
    /// 270°
    Up,
    /// 315°
    UpRight,
}

impl Facing {
    /// All facings in angular order starting at 0°.
    pub const ALL: [Self; 8] = [
        Self::Right,
        Self::DownRight,
        Self::Down,
        Self::DownLeft,
        Self::Left,
        Self::UpLeft,
        Self::Up,
        Self::UpRight,
    ];

    /// Sector containing `degrees`.
    ///
    /// Each sector covers `[center - 22.5°, center + 22.5°)`, so a boundary
    /// angle belongs to the sector clockwise of it. Any finite angle is
    /// accepted and wrapped into `[0°, 360°)`.
    #[must_use]
    pub fn from_degrees(degrees: f64) -> Self {
        let wrapped = degrees.rem_euclid(360.0);
        let sector = ((wrapped + 22.5) / 45.0).floor() as usize % 8;
        Self::ALL[sector]
    }

    /// Sector of a relative vector. A zero vector maps to [`Facing::Right`].
    #[must_use]
    pub fn quantize(relative: Vec2) -> Self {
        let degrees = f64::from(relative.y)
            .atan2(f64::from(relative.x))
            .to_degrees();
        Self::from_degrees(degrees)
    }

    /// Facing from per-axis signs. A zero vector maps to [`Facing::Down`].
    #[must_use]
    pub fn from_signs(relative: Vec2) -> Self {
        Self::from_delta(axis_sign(relative.x), axis_sign(relative.y)).unwrap_or_default()
    }

    /// Facing for an integer step, or `None` for `(0, 0)` or non-unit steps.
    #[must_use]
    pub const fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (1, 0) => Some(Self::Right),
            (1, 1) => Some(Self::DownRight),
            (0, 1) => Some(Self::Down),
            (-1, 1) => Some(Self::DownLeft),
            (-1, 0) => Some(Self::Left),
            (-1, -1) => Some(Self::UpLeft),
            (0, -1) => Some(Self::Up),
            (1, -1) => Some(Self::UpRight),
            _ => None,
        }
    }

    /// Integer step `(dx, dy)` with components in `{-1, 0, 1}`.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::DownRight => (1, 1),
            Self::Down => (0, 1),
            Self::DownLeft => (-1, 1),
            Self::Left => (-1, 0),
            Self::UpLeft => (-1, -1),
            Self::Up => (0, -1),
            Self::UpRight => (1, -1),
        }
    }

    /// Center angle of the sector in degrees.
    #[must_use]
    pub fn degrees(self) -> f64 {
        f64::from(self as u8) * 45.0
    }

    /// Unit vector pointing through the sector center.
    #[must_use]
    pub fn unit_vector(self) -> Vec2 {
        let (dx, dy) = self.delta();
        Vec2::new(dx as f32, dy as f32).normalize()
    }
}

fn axis_sign(value: f32) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Unit vector along `relative`. A zero vector aims straight down.
#[must_use]
pub fn precise_aim(relative: Vec2) -> Vec2 {
    relative.try_normalize().unwrap_or(Vec2::Y)
}

/// How an agent turns its aim into a facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AimPolicy {
    /// Melee-capable: snap to the 8 sectors for hit arcs and sprites.
    Sectors,
    /// Ranged-only: use the precise vector, facing is just its axis signs.
    AxisSigns,
}

impl AimPolicy {
    /// Policy for a class with the given attack kinds.
    #[must_use]
    pub const fn for_attacks(has_melee: bool, has_projectile: bool) -> Self {
        if has_projectile && !has_melee {
            Self::AxisSigns
        } else {
            Self::Sectors
        }
    }
}

/// Facing plus precise vector, computed together from one relative vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aim {
    /// Quantized facing
    pub facing: Facing,
    /// Precise unit vector
    pub precise: Vec2,
}

impl Default for Aim {
    fn default() -> Self {
        Self {
            facing: Facing::Down,
            precise: Vec2::Y,
        }
    }
}

impl Aim {
    /// Aims along `relative` under `policy`.
    #[must_use]
    pub fn toward(relative: Vec2, policy: AimPolicy) -> Self {
        let precise = precise_aim(relative);
        let facing = match policy {
            AimPolicy::Sectors => Facing::quantize(relative),
            AimPolicy::AxisSigns => Facing::from_signs(precise),
        };
        Self { facing, precise }
    }

    /// Aim matching a movement step, used while roaming.
    #[must_use]
    pub fn along(facing: Facing) -> Self {
        Self {
            facing,
            precise: facing.unit_vector(),
        }
    }
}
