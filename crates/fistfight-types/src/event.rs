//! `BattleEvent` — the discriminated union the domain engine returns.
//!
//! Flattened from the source's event-hub/DTO inheritance (spec.md §9):
//! one tagged enum instead of a class hierarchy.

use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;
use crate::state::EndReason;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    PlayerDamaged {
        player_id: PlayerId,
        damage: u32,
        remaining_hp: u32,
        turn_index: u64,
    },
    TurnResolved {
        turn_index: u64,
    },
    BattleEnded {
        reason: EndReason,
        winner_player_id: Option<PlayerId>,
    },
}
