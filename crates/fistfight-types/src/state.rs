//! Battle and player state structures — `BattleDomainState`, `PlayerState`.
//!
//! These are the persisted shapes written and read by the State Store
//! (timestamps are unix-milliseconds there to avoid floating-point score
//! precision loss in the deadline sorted set); see `fistfight-store`.

use serde::{Deserialize, Serialize};

use crate::ids::{BattleId, MatchId, PlayerId};
use crate::ruleset::Ruleset;

/// Raw attribute block for one player, fed into the combat math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub strength: f64,
    pub stamina: f64,
    pub agility: f64,
    pub intuition: f64,
}

/// One side of a battle: identity, derived max HP, and current HP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub max_hp: u32,
    pub current_hp: u32,
    pub stats: PlayerStats,
}

impl PlayerState {
    pub fn is_dead(&self) -> bool {
        self.current_hp == 0
    }
}

/// The phase graph from spec.md §3. Only the edges listed there exist:
/// `ArenaOpen -> TurnOpen -> Resolving -> TurnOpen` and `Resolving -> Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ArenaOpen,
    TurnOpen,
    Resolving,
    Ended,
}

/// Why a battle ended, carried on `BattleEnded` (engine event, realtime
/// push, and bus message all use the same variants — spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Normal,
    DoubleForfeit,
    Timeout,
    Cancelled,
    AdminForced,
    SystemError,
}

/// The full persisted state of one battle.
///
/// `version` is monotonically incremented by the State Store on every
/// persisted mutation (spec.md §3); every other field here is set only by
/// the atomic store operations in `fistfight-store`, never mutated ad hoc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleDomainState {
    pub battle_id: BattleId,
    pub match_id: MatchId,
    pub player_a_id: PlayerId,
    pub player_b_id: PlayerId,
    pub ruleset: Ruleset,
    pub phase: Phase,
    pub turn_index: u64,
    pub no_action_streak_both: u32,
    pub last_resolved_turn_index: u64,
    pub player_a: PlayerState,
    pub player_b: PlayerState,
    /// Unix milliseconds. Meaningful while `phase = TurnOpen`; may already
    /// be in the past if resolution hasn't caught up yet.
    pub deadline_unix_ms: i64,
    pub version: u64,
    pub end_reason: Option<EndReason>,
    pub winner_player_id: Option<PlayerId>,
}

impl BattleDomainState {
    pub fn player_state(&self, player_id: &PlayerId) -> Option<&PlayerState> {
        if &self.player_a.player_id == player_id {
            Some(&self.player_a)
        } else if &self.player_b.player_id == player_id {
            Some(&self.player_b)
        } else {
            None
        }
    }

    pub fn is_participant(&self, player_id: &PlayerId) -> bool {
        self.player_a.player_id == *player_id || self.player_b.player_id == *player_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> PlayerStats {
        PlayerStats { strength: 5.0, stamina: 10.0, agility: 0.0, intuition: 0.0 }
    }

    fn state() -> BattleDomainState {
        BattleDomainState {
            battle_id: BattleId::from("b1"),
            match_id: MatchId::from("m1"),
            player_a_id: PlayerId::from("a"),
            player_b_id: PlayerId::from("b"),
            ruleset: Ruleset {
                version: 1,
                turn_seconds: 10,
                no_action_limit: 3,
                seed: 123,
                combat_balance: crate::ruleset::CombatBalance::default(),
            },
            phase: Phase::ArenaOpen,
            turn_index: 0,
            no_action_streak_both: 0,
            last_resolved_turn_index: 0,
            player_a: PlayerState { player_id: PlayerId::from("a"), max_hp: 100, current_hp: 100, stats: stats() },
            player_b: PlayerState { player_id: PlayerId::from("b"), max_hp: 100, current_hp: 100, stats: stats() },
            deadline_unix_ms: 0,
            version: 1,
            end_reason: None,
            winner_player_id: None,
        }
    }

    #[test]
    fn participant_lookup() {
        let s = state();
        assert!(s.is_participant(&PlayerId::from("a")));
        assert!(s.is_participant(&PlayerId::from("b")));
        assert!(!s.is_participant(&PlayerId::from("c")));
        assert_eq!(s.player_state(&PlayerId::from("a")).unwrap().player_id, PlayerId::from("a"));
        assert!(s.player_state(&PlayerId::from("c")).is_none());
    }

    #[test]
    fn dead_iff_zero_hp() {
        let mut p = state().player_a;
        assert!(!p.is_dead());
        p.current_hp = 0;
        assert!(p.is_dead());
    }
}
