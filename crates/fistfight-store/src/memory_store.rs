//! An in-memory `StateStore` double, guarded by the same rules as the
//! Redis Lua scripts (see `scripts`), used for fast deterministic service
//! tests that don't need a real Redis instance — mirroring how the
//! teacher's engine tests exercise game state directly without spinning
//! up a server.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use fistfight_types::{BattleDomainState, BattleId, EndReason, Phase, PlayerId, UtcMillis};

use crate::error::Result;
use crate::idempotency::CommandIdempotency;
use crate::model::{ClaimedBattle, EndOutcome, InitOutcome, StoreActionOutcome};
use crate::state_store::StateStore;

#[derive(Default)]
struct Inner {
    states: DashMap<BattleId, BattleDomainState>,
    deadlines: Mutex<BTreeMap<(i64, BattleId), ()>>,
    locks: DashMap<(BattleId, u64), ()>,
    actions: DashMap<(BattleId, u64, PlayerId), Vec<u8>>,
    commands_seen: DashMap<BattleId, ()>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Inner,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex_deadline(&self, battle_id: &BattleId, old_ms: Option<i64>, new_ms: Option<i64>) {
        let mut deadlines = self.inner.deadlines.lock().expect("deadlines mutex poisoned");
        if let Some(old) = old_ms {
            deadlines.remove(&(old, battle_id.clone()));
        }
        if let Some(new) = new_ms {
            deadlines.insert((new, battle_id.clone()), ());
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn try_initialize_battle(
        &self,
        battle_id: &BattleId,
        initial_state: &BattleDomainState,
    ) -> Result<InitOutcome> {
        match self.inner.states.entry(battle_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(InitOutcome::AlreadyExists),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(initial_state.clone());
                Ok(InitOutcome::Created)
            }
        }
    }

    async fn get_state(&self, battle_id: &BattleId) -> Result<Option<BattleDomainState>> {
        Ok(self.inner.states.get(battle_id).map(|s| s.clone()))
    }

    async fn try_open_turn(&self, battle_id: &BattleId, turn_index: u64, deadline: UtcMillis) -> Result<bool> {
        let Some(mut state) = self.inner.states.get_mut(battle_id) else { return Ok(false) };

        if state.last_resolved_turn_index as i64 != turn_index as i64 - 1 {
            return Ok(false);
        }
        if !matches!(state.phase, Phase::ArenaOpen | Phase::Resolving) {
            return Ok(false);
        }

        let old_deadline = if state.phase == Phase::TurnOpen { Some(state.deadline_unix_ms) } else { None };
        state.phase = Phase::TurnOpen;
        state.turn_index = turn_index;
        state.deadline_unix_ms = deadline.0;
        state.version += 1;
        drop(state);

        self.reindex_deadline(battle_id, old_deadline, Some(deadline.0));
        Ok(true)
    }

    async fn try_mark_turn_resolving(&self, battle_id: &BattleId, turn_index: u64) -> Result<bool> {
        let Some(mut state) = self.inner.states.get_mut(battle_id) else { return Ok(false) };
        if state.phase != Phase::TurnOpen || state.turn_index != turn_index {
            return Ok(false);
        }
        state.phase = Phase::Resolving;
        state.version += 1;
        Ok(true)
    }

    async fn mark_turn_resolved_and_open_next(
        &self,
        battle_id: &BattleId,
        cur_turn: u64,
        next_turn: u64,
        next_deadline: UtcMillis,
        no_action_streak: u32,
        hp_a: u32,
        hp_b: u32,
    ) -> Result<bool> {
        let Some(mut state) = self.inner.states.get_mut(battle_id) else { return Ok(false) };
        if state.phase != Phase::Resolving || state.turn_index != cur_turn {
            return Ok(false);
        }
        state.last_resolved_turn_index = cur_turn;
        state.phase = Phase::TurnOpen;
        state.turn_index = next_turn;
        state.deadline_unix_ms = next_deadline.0;
        state.no_action_streak_both = no_action_streak;
        state.player_a.current_hp = hp_a;
        state.player_b.current_hp = hp_b;
        state.version += 1;
        drop(state);

        self.reindex_deadline(battle_id, None, Some(next_deadline.0));
        Ok(true)
    }

    async fn end_battle_and_mark_resolved(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        no_action_streak: u32,
        hp_a: u32,
        hp_b: u32,
        reason: EndReason,
        winner_player_id: Option<PlayerId>,
    ) -> Result<EndOutcome> {
        let Some(mut state) = self.inner.states.get_mut(battle_id) else { return Ok(EndOutcome::NotCommitted) };
        if state.phase == Phase::Ended {
            return Ok(EndOutcome::AlreadyEnded);
        }
        if state.phase != Phase::Resolving || state.turn_index != turn_index {
            return Ok(EndOutcome::NotCommitted);
        }

        let old_deadline = state.deadline_unix_ms;
        state.phase = Phase::Ended;
        state.last_resolved_turn_index = turn_index;
        state.no_action_streak_both = no_action_streak;
        state.player_a.current_hp = hp_a;
        state.player_b.current_hp = hp_b;
        state.end_reason = Some(reason);
        state.winner_player_id = winner_player_id;
        state.version += 1;
        drop(state);

        self.reindex_deadline(battle_id, Some(old_deadline), None);
        Ok(EndOutcome::EndedNow)
    }

    async fn claim_due_battles(
        &self,
        now: UtcMillis,
        limit: usize,
        lease_ttl_ms: i64,
        small_delay_ms: i64,
    ) -> Result<Vec<ClaimedBattle>> {
        let candidates: Vec<BattleId> = {
            let deadlines = self.inner.deadlines.lock().expect("deadlines mutex poisoned");
            deadlines
                .range(..=(now.0, BattleId::from(format!("\u{10FFFF}"))))
                .filter(|((score, _), ())| *score <= now.0)
                .take(limit)
                .map(|((_, id), ())| id.clone())
                .collect()
        };

        let mut claimed = Vec::new();
        for battle_id in candidates {
            let Some(state) = self.inner.states.get(&battle_id).map(|s| s.clone()) else {
                self.reindex_deadline(&battle_id, Some(now.0), None);
                continue;
            };

            if !matches!(state.phase, Phase::TurnOpen | Phase::Ended) {
                self.reindex_deadline(&battle_id, Some(state.deadline_unix_ms), Some(now.0 + small_delay_ms));
                continue;
            }

            let lock = (battle_id.clone(), state.turn_index);
            if self.inner.locks.contains_key(&lock) {
                continue;
            }
            self.inner.locks.insert(lock, ());
            self.reindex_deadline(&battle_id, Some(state.deadline_unix_ms), Some(now.0 + lease_ttl_ms));
            claimed.push(ClaimedBattle { battle_id, turn_index: state.turn_index });
        }

        Ok(claimed)
    }

    async fn store_action(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        player_id: &PlayerId,
        payload: &[u8],
        _ttl_secs: u64,
    ) -> Result<StoreActionOutcome> {
        match self.inner.actions.entry((battle_id.clone(), turn_index, player_id.clone())) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(StoreActionOutcome::AlreadySubmitted),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(payload.to_vec());
                Ok(StoreActionOutcome::Accepted)
            }
        }
    }

    async fn get_actions(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        player_a_id: &PlayerId,
        player_b_id: &PlayerId,
    ) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>)> {
        let a = self.inner.actions.get(&(battle_id.clone(), turn_index, player_a_id.clone())).map(|v| v.clone());
        let b = self.inner.actions.get(&(battle_id.clone(), turn_index, player_b_id.clone())).map(|v| v.clone());
        Ok((a, b))
    }
}

#[async_trait]
impl CommandIdempotency for MemoryStore {
    async fn try_mark_command_created(&self, battle_id: &BattleId) -> Result<bool> {
        match self.inner.commands_seen.entry(battle_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fistfight_types::{CombatBalance, MatchId, PlayerState, PlayerStats, Ruleset};

    fn player(id: &str) -> PlayerState {
        PlayerState {
            player_id: PlayerId::from(id),
            max_hp: 100,
            current_hp: 100,
            stats: PlayerStats { strength: 5.0, stamina: 10.0, agility: 0.0, intuition: 0.0 },
        }
    }

    fn arena_open_state(battle_id: &str) -> BattleDomainState {
        BattleDomainState {
            battle_id: BattleId::from(battle_id),
            match_id: MatchId::from("m1"),
            player_a_id: PlayerId::from("a"),
            player_b_id: PlayerId::from("b"),
            ruleset: Ruleset { version: 1, turn_seconds: 10, no_action_limit: 3, seed: 1, combat_balance: CombatBalance::default() },
            phase: Phase::ArenaOpen,
            turn_index: 0,
            no_action_streak_both: 0,
            last_resolved_turn_index: 0,
            player_a: player("a"),
            player_b: player("b"),
            deadline_unix_ms: 0,
            version: 1,
            end_reason: None,
            winner_player_id: None,
        }
    }

    #[tokio::test]
    async fn command_idempotency_anchor_fires_once() {
        let store = MemoryStore::new();
        let battle_id = BattleId::from("b1");
        assert!(store.try_mark_command_created(&battle_id).await.unwrap());
        assert!(!store.try_mark_command_created(&battle_id).await.unwrap());
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let store = MemoryStore::new();
        let battle_id = BattleId::from("b1");
        let state = arena_open_state("b1");
        assert_eq!(store.try_initialize_battle(&battle_id, &state).await.unwrap(), InitOutcome::Created);
        assert_eq!(store.try_initialize_battle(&battle_id, &state).await.unwrap(), InitOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn open_turn_then_resolve_then_end() {
        let store = MemoryStore::new();
        let battle_id = BattleId::from("b1");
        let state = arena_open_state("b1");
        store.try_initialize_battle(&battle_id, &state).await.unwrap();

        assert!(store.try_open_turn(&battle_id, 1, UtcMillis(1_000)).await.unwrap());
        assert!(store.try_mark_turn_resolving(&battle_id, 1).await.unwrap());
        // A second concurrent resolver loses the CAS.
        assert!(!store.try_mark_turn_resolving(&battle_id, 1).await.unwrap());

        let outcome = store
            .end_battle_and_mark_resolved(&battle_id, 1, 0, 0, 50, EndReason::Normal, Some(PlayerId::from("a")))
            .await
            .unwrap();
        assert_eq!(outcome, EndOutcome::EndedNow);

        let again = store
            .end_battle_and_mark_resolved(&battle_id, 1, 0, 0, 50, EndReason::Normal, Some(PlayerId::from("a")))
            .await
            .unwrap();
        assert_eq!(again, EndOutcome::AlreadyEnded);
    }

    #[tokio::test]
    async fn store_action_first_write_wins() {
        let store = MemoryStore::new();
        let battle_id = BattleId::from("b1");
        let player_id = PlayerId::from("a");
        assert_eq!(
            store.store_action(&battle_id, 1, &player_id, b"first", 60).await.unwrap(),
            StoreActionOutcome::Accepted
        );
        assert_eq!(
            store.store_action(&battle_id, 1, &player_id, b"second", 60).await.unwrap(),
            StoreActionOutcome::AlreadySubmitted
        );
        let (a, _) = store.get_actions(&battle_id, 1, &player_id, &PlayerId::from("b")).await.unwrap();
        assert_eq!(a.unwrap(), b"first");
    }

    #[tokio::test]
    async fn claim_due_battles_acquires_at_most_one_lock() {
        let store = MemoryStore::new();
        let battle_id = BattleId::from("b1");
        let state = arena_open_state("b1");
        store.try_initialize_battle(&battle_id, &state).await.unwrap();
        store.try_open_turn(&battle_id, 1, UtcMillis(500)).await.unwrap();

        let claimed = store.claim_due_battles(UtcMillis(1_000), 10, 12_000, 200).await.unwrap();
        assert_eq!(claimed, vec![ClaimedBattle { battle_id: battle_id.clone(), turn_index: 1 }]);

        // The lease is held now, so a second claim pass finds nothing new
        // (the deadline score was pushed out past `now`).
        let claimed_again = store.claim_due_battles(UtcMillis(1_000), 10, 12_000, 200).await.unwrap();
        assert!(claimed_again.is_empty());
    }
}
