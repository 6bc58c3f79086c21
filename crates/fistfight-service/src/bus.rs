//! Bus message shapes and the publish/consume port (spec.md §6, §4.11,
//! §4.12). The production transport is Redis Streams (`XADD`/
//! `XREADGROUP`) — see SPEC_FULL.md §A for why: no message-bus crate
//! appears anywhere in the retrieval pack, so the store's own Redis
//! connection doubles as the bus transport rather than a fabricated
//! Kafka/NATS dependency.

use async_trait::async_trait;
use fistfight_types::{BattleId, EndReason, MatchId, PlayerId, Ruleset, UtcMillis};
use serde::{Deserialize, Serialize};

/// `CreateBattle` (spec.md §6, bus command in). At-least-once, idempotent
/// on `battle_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleCommand {
    pub battle_id: BattleId,
    pub match_id: MatchId,
    pub player_a_id: PlayerId,
    pub player_b_id: PlayerId,
    pub ruleset: Ruleset,
    pub requested_at: UtcMillis,
}

/// `BattleCreated` (spec.md §6, internal bus event, optional). Identical
/// payload shape to `CreateBattleCommand` plus a `state` label; see
/// DESIGN.md for the Open Question decision on when this is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleCreatedMessage {
    pub battle_id: BattleId,
    pub match_id: MatchId,
    pub player_a_id: PlayerId,
    pub player_b_id: PlayerId,
    pub ruleset: Ruleset,
    pub requested_at: UtcMillis,
    pub state: &'static str,
}

impl BattleCreatedMessage {
    pub fn from_command(cmd: &CreateBattleCommand) -> Self {
        Self {
            battle_id: cmd.battle_id.clone(),
            match_id: cmd.match_id.clone(),
            player_a_id: cmd.player_a_id.clone(),
            player_b_id: cmd.player_b_id.clone(),
            ruleset: cmd.ruleset.clone(),
            requested_at: cmd.requested_at,
            state: "created",
        }
    }
}

/// `BattleEnded` (spec.md §6, bus event out). Published at most once per
/// `battle_id` (spec.md §4.11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleEndedMessage {
    pub battle_id: BattleId,
    pub match_id: MatchId,
    pub reason: EndReason,
    pub winner_player_id: Option<PlayerId>,
    pub ended_at: UtcMillis,
    pub version: u64,
}

/// The outbound side of the bus: at-least-once delivery, no outbox
/// required inside the core (spec.md §4.11) — downstream consumers are
/// expected to be idempotent on `battle_id`.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish_battle_created(&self, message: &BattleCreatedMessage);
    async fn publish_battle_ended(&self, message: &BattleEndedMessage);
}

/// A bus double that drops every publish, for tests that only care about
/// store-side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBus;

#[async_trait]
impl EventBus for NullEventBus {
    async fn publish_battle_created(&self, _message: &BattleCreatedMessage) {}
    async fn publish_battle_ended(&self, _message: &BattleEndedMessage) {}
}
