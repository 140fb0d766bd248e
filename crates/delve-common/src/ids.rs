//! Agent identifiers.
//!
//! Ids are handed out per encounter by an [`AgentIdAllocator`], so the same
//! map and seed always produce the same ids. Zero is reserved as a null id.

use serde::{Deserialize, Serialize};

/// Identifier of an agent (enemy or boss) within one encounter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AgentId(u64);

impl AgentId {
    /// Null agent id, never issued by an allocator.
    pub const NULL: Self = Self(0);

    /// Creates an agent id from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this id could have been issued (non-null).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Issues agent ids in spawn order, starting at 1.
///
/// Ids are never reused, even after the agent they named is removed.
#[derive(Debug, Clone, Default)]
pub struct AgentIdAllocator {
    issued: u64,
}

impl AgentIdAllocator {
    /// Creates an allocator that has issued nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { issued: 0 }
    }

    /// Issues the next id.
    pub fn next_id(&mut self) -> AgentId {
        self.issued = self.issued.saturating_add(1);
        AgentId(self.issued)
    }

    /// Number of ids issued so far.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.issued
    }

    /// Whether `id` came from this allocator.
    #[must_use]
    pub const fn has_issued(&self, id: AgentId) -> bool {
        id.is_valid() && id.0 <= self.issued
    }
}
