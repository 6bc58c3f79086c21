//! Store key layout (spec.md §4.5).

use fistfight_types::{BattleId, PlayerId};

pub const ACTIVE_SET_KEY: &str = "battle:active";
pub const DEADLINES_ZSET_KEY: &str = "battle:deadlines";

pub fn state_key(battle_id: &BattleId) -> String {
    format!("battle:state:{battle_id}")
}

pub fn action_key(battle_id: &BattleId, turn_index: u64, player_id: &PlayerId) -> String {
    format!("battle:action:{battle_id}:turn:{turn_index}:player:{player_id}")
}

pub fn lock_key(battle_id: &BattleId, turn_index: u64) -> String {
    format!("lock:battle:{battle_id}:turn:{turn_index}")
}

/// Idempotency anchor for the Command Consumer (SPEC_FULL.md §C): stands
/// in for the `battles` table row spec.md §4.12 describes, since no SQL
/// crate appears anywhere in the retrieval pack.
pub fn command_created_key(battle_id: &BattleId) -> String {
    format!("cmd:created:{battle_id}")
}
