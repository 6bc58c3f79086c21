//! The `StateStore` port — sole custodian of persisted battle state and
//! the deadline index (spec.md §4.5).

use async_trait::async_trait;
use fistfight_types::{BattleDomainState, BattleId, EndReason, PlayerId, UtcMillis};

use crate::error::Result;
use crate::model::{ClaimedBattle, EndOutcome, InitOutcome, StoreActionOutcome};

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn try_initialize_battle(
        &self,
        battle_id: &BattleId,
        initial_state: &BattleDomainState,
    ) -> Result<InitOutcome>;

    async fn get_state(&self, battle_id: &BattleId) -> Result<Option<BattleDomainState>>;

    async fn try_open_turn(&self, battle_id: &BattleId, turn_index: u64, deadline: UtcMillis) -> Result<bool>;

    async fn try_mark_turn_resolving(&self, battle_id: &BattleId, turn_index: u64) -> Result<bool>;

    #[allow(clippy::too_many_arguments)]
    async fn mark_turn_resolved_and_open_next(
        &self,
        battle_id: &BattleId,
        cur_turn: u64,
        next_turn: u64,
        next_deadline: UtcMillis,
        no_action_streak: u32,
        hp_a: u32,
        hp_b: u32,
    ) -> Result<bool>;

    #[allow(clippy::too_many_arguments)]
    async fn end_battle_and_mark_resolved(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        no_action_streak: u32,
        hp_a: u32,
        hp_b: u32,
        reason: EndReason,
        winner_player_id: Option<PlayerId>,
    ) -> Result<EndOutcome>;

    async fn claim_due_battles(
        &self,
        now: UtcMillis,
        limit: usize,
        lease_ttl_ms: i64,
        small_delay_ms: i64,
    ) -> Result<Vec<ClaimedBattle>>;

    async fn store_action(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        player_id: &PlayerId,
        payload: &[u8],
        ttl_secs: u64,
    ) -> Result<StoreActionOutcome>;

    async fn get_actions(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        player_a_id: &PlayerId,
        player_b_id: &PlayerId,
    ) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>)>;
}
