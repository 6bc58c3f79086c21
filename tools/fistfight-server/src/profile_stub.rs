//! Stand-in `PlayerProfileProvider` (spec.md §9 "Player Profile Store" is
//! explicitly out of scope). Returns the same baseline stats for any player
//! id, so the Lifecycle Service's derived-HP step (spec.md §4.8 step 2-3)
//! always has something to work with when running this binary standalone.

use async_trait::async_trait;
use fistfight_service::{PlayerProfile, PlayerProfileProvider};
use fistfight_types::{PlayerId, PlayerStats};

pub struct DefaultStatsProfileProvider {
    stats: PlayerStats,
}

impl DefaultStatsProfileProvider {
    pub fn new(stats: PlayerStats) -> Self {
        Self { stats }
    }
}

impl Default for DefaultStatsProfileProvider {
    fn default() -> Self {
        Self::new(PlayerStats { strength: 5.0, stamina: 10.0, agility: 1.0, intuition: 1.0 })
    }
}

#[async_trait]
impl PlayerProfileProvider for DefaultStatsProfileProvider {
    async fn get_profile(&self, _player_id: &PlayerId) -> Option<PlayerProfile> {
        Some(PlayerProfile { stats: self.stats })
    }
}
