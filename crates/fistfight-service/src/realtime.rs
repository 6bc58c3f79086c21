//! The Realtime Notifier port (spec.md §4.10) — push-oriented, best-effort
//! fan-out keyed by battle id. Concrete transports (the server's axum
//! WebSocket registry, or a no-op double in tests) implement this trait.

use async_trait::async_trait;
use fistfight_types::{BattleDomainState, BattleId, EndReason, PlayerId, UtcMillis};
use serde::Serialize;

/// One push event, tagged the way the client protocol expects
/// (spec.md §6 "Server → client push events").
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    BattleReady {
        battle_id: BattleId,
        player_a_id: PlayerId,
        player_b_id: PlayerId,
    },
    TurnOpened {
        battle_id: BattleId,
        turn_index: u64,
        deadline_utc: UtcMillis,
    },
    TurnResolved {
        battle_id: BattleId,
        turn_index: u64,
        action_a_desc: String,
        action_b_desc: String,
    },
    PlayerDamaged {
        battle_id: BattleId,
        player_id: PlayerId,
        damage: u32,
        remaining_hp: u32,
        turn_index: u64,
    },
    BattleStateUpdated {
        battle_id: BattleId,
        snapshot: BattleSnapshot,
    },
    BattleEnded {
        battle_id: BattleId,
        reason: EndReason,
        winner_player_id: Option<PlayerId>,
        ended_at: UtcMillis,
    },
}

/// The full snapshot returned from `JoinBattle` and carried on
/// `BattleStateUpdated` (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleSnapshot {
    pub battle_id: BattleId,
    pub player_a_id: PlayerId,
    pub player_b_id: PlayerId,
    pub phase: fistfight_types::Phase,
    pub turn_index: u64,
    pub deadline_utc: UtcMillis,
    pub no_action_streak_both: u32,
    pub last_resolved_turn_index: u64,
    pub ended_reason: Option<EndReason>,
    pub version: u64,
    pub player_a_hp: Option<u32>,
    pub player_b_hp: Option<u32>,
}

impl BattleSnapshot {
    pub fn from_state(state: &BattleDomainState) -> Self {
        Self {
            battle_id: state.battle_id.clone(),
            player_a_id: state.player_a_id.clone(),
            player_b_id: state.player_b_id.clone(),
            phase: state.phase,
            turn_index: state.turn_index,
            deadline_utc: UtcMillis(state.deadline_unix_ms),
            no_action_streak_both: state.no_action_streak_both,
            last_resolved_turn_index: state.last_resolved_turn_index,
            ended_reason: state.end_reason,
            version: state.version,
            player_a_hp: Some(state.player_a.current_hp),
            player_b_hp: Some(state.player_b.current_hp),
        }
    }
}

/// Fan-out port: delivery is best-effort and fire-and-forget from the
/// service's perspective (spec.md §4.10) — clients refetch via
/// `JoinBattle` on reconnect, so a dropped push is not a correctness bug.
#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn publish(&self, battle_id: &BattleId, event: RealtimeEvent);
}

/// A notifier double that drops every event, for tests that don't care
/// about push delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl RealtimeNotifier for NullNotifier {
    async fn publish(&self, _battle_id: &BattleId, _event: RealtimeEvent) {}
}
