//! Player profile lookup port.
//!
//! `CreateBattle` carries only player ids; the Lifecycle Service needs raw
//! attributes (strength/stamina/agility/intuition) to compute each side's
//! derived HP before the battle can be initialized (spec.md §4.8 step 2-3).
//! The profile source itself (player service, cache, database) is outside
//! this system's scope, so it's a port like the store and the bus.

use async_trait::async_trait;
use fistfight_types::{PlayerId, PlayerStats};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerProfile {
    pub stats: PlayerStats,
}

#[async_trait]
pub trait PlayerProfileProvider: Send + Sync {
    async fn get_profile(&self, player_id: &PlayerId) -> Option<PlayerProfile>;
}

/// An in-memory profile source for tests and the dev CLI, keyed by id.
#[derive(Debug, Default)]
pub struct StaticProfileProvider {
    profiles: dashmap::DashMap<PlayerId, PlayerProfile>,
}

impl StaticProfileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, player_id: PlayerId, stats: PlayerStats) -> Self {
        self.profiles.insert(player_id, PlayerProfile { stats });
        self
    }
}

#[async_trait]
impl PlayerProfileProvider for StaticProfileProvider {
    async fn get_profile(&self, player_id: &PlayerId) -> Option<PlayerProfile> {
        self.profiles.get(player_id).map(|entry| *entry)
    }
}
