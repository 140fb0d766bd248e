//! Damage immunity window.

use delve_common::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Invulnerability window, independent of behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Immunity {
    active: bool,
    ends_at: Timestamp,
}

impl Immunity {
    /// Creates an inactive window.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: false,
            ends_at: Timestamp::ZERO,
        }
    }

    /// Arms the window until `ends_at`. An earlier end than the current one
    /// never shortens an active window.
    pub fn arm_until(&mut self, ends_at: Timestamp) {
        if !self.active || ends_at > self.ends_at {
            self.ends_at = ends_at;
        }
        self.active = true;
    }

    /// Arms the window for `duration` from `now`.
    pub fn arm_for(&mut self, now: Timestamp, duration: Duration) {
        self.arm_until(now + duration);
    }

    /// Expires the window once `now` has reached its end.
    pub fn refresh(&mut self, now: Timestamp) {
        if self.active && now >= self.ends_at {
            self.active = false;
        }
    }

    /// Pushes the end out by half of the time still left.
    pub fn extend_by_half_remaining(&mut self, now: Timestamp) {
        if self.active {
            let remaining = self.remaining(now);
            self.ends_at += remaining / 2;
        }
    }

    /// Whether damage should currently be ignored.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// End of the window.
    #[must_use]
    pub const fn ends_at(&self) -> Timestamp {
        self.ends_at
    }

    /// Time left, zero when inactive.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> Duration {
        if self.active {
            now.saturating_until(self.ends_at)
        } else {
            Duration::ZERO
        }
    }
}
