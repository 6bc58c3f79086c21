//! Turn Service — `SubmitAction` and `ResolveTurn` (spec.md §4.7).
//!
//! The `TryMarkTurnResolving` CAS inside `resolve_turn` is the single
//! serialization point per turn (spec.md §4.7.3); everything else here is
//! safe under arbitrary interleaving because every store call is atomic.

use std::sync::Arc;
use std::time::Instant;

use fistfight_engine::Clock;
use fistfight_store::{EndOutcome, StateStore};
use fistfight_types::{BattleDomainState, BattleEvent, BattleId, EndReason, Phase, PlayerAction, PlayerId, UtcMillis};
use tracing::{error, instrument, warn};

use crate::bus::{BattleEndedMessage, EventBus};
use crate::error::{Result, ServiceError};
use crate::metrics as svc_metrics;
use crate::realtime::{BattleSnapshot, RealtimeEvent, RealtimeNotifier};

/// Small allowance past the stored deadline before a late submit is
/// treated as `NoAction` (spec.md §5 "Timeouts", e.g. 1s).
const DEFAULT_NETWORK_GRACE_MS: i64 = 1_000;

pub struct TurnService {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn RealtimeNotifier>,
    bus: Arc<dyn EventBus>,
    network_grace_ms: i64,
}

impl TurnService {
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn RealtimeNotifier>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self { store, clock, notifier, bus, network_grace_ms: DEFAULT_NETWORK_GRACE_MS }
    }

    pub fn with_network_grace_ms(mut self, grace_ms: i64) -> Self {
        self.network_grace_ms = grace_ms;
        self
    }

    /// Spec.md §4.7.1.
    #[instrument(skip(self, payload), fields(battle_id = %battle_id, player_id = %player_id, client_turn_index))]
    pub async fn submit_action(
        &self,
        battle_id: &BattleId,
        player_id: &PlayerId,
        client_turn_index: u64,
        payload: &[u8],
    ) -> Result<()> {
        let state = self
            .store
            .get_state(battle_id)
            .await?
            .ok_or_else(|| ServiceError::BattleNotFound(battle_id.clone()))?;

        if !state.is_participant(player_id) {
            return Err(ServiceError::NotParticipant);
        }
        if state.phase == Phase::Ended {
            return Err(ServiceError::BattleEnded);
        }

        let action = self.normalize_submission(&state, client_turn_index, payload);
        let bytes = serde_json::to_vec(&action).expect("PlayerAction always serializes");

        self.store.store_action(battle_id, state.turn_index, player_id, &bytes, action_ttl_secs(&state)).await?;

        let (player_a_id, player_b_id) = (state.player_a_id.clone(), state.player_b_id.clone());
        let (a, b) = self.store.get_actions(battle_id, state.turn_index, &player_a_id, &player_b_id).await?;
        if a.is_some() && b.is_some() {
            // Best-effort early resolution (spec.md §4.7.1 step 6): errors
            // here are logged, never surfaced to the submitting client.
            if let Err(err) = self.resolve_turn(battle_id).await {
                warn!(battle_id = %battle_id, error = %err, "early resolve attempt failed");
            }
        }

        Ok(())
    }

    fn normalize_submission(&self, state: &BattleDomainState, client_turn_index: u64, payload: &[u8]) -> PlayerAction {
        if state.phase != Phase::TurnOpen {
            return PlayerAction::NoAction;
        }
        if client_turn_index != state.turn_index {
            return PlayerAction::NoAction;
        }
        let now = self.clock.now();
        let grace_deadline = UtcMillis(state.deadline_unix_ms).plus_millis(self.network_grace_ms);
        if now.0 > grace_deadline.0 {
            return PlayerAction::NoAction;
        }
        fistfight_types::action::normalize_payload_bytes(payload)
    }

    /// Spec.md §4.7.2. Returns whether this call performed the resolution.
    #[instrument(skip(self), fields(battle_id = %battle_id))]
    pub async fn resolve_turn(&self, battle_id: &BattleId) -> Result<bool> {
        let Some(state) = self.store.get_state(battle_id).await? else {
            return Ok(false);
        };

        if state.turn_index <= state.last_resolved_turn_index {
            return Ok(false);
        }
        match state.phase {
            Phase::TurnOpen => {}
            Phase::Ended => return Ok(false),
            Phase::Resolving => return Ok(false),
            Phase::ArenaOpen => {
                error!(battle_id = %battle_id, "resolve_turn called while battle is still ArenaOpen");
                return Ok(false);
            }
        }

        let turn_index = state.turn_index;
        let resolve_started_at = Instant::now();
        if !self.store.try_mark_turn_resolving(battle_id, turn_index).await? {
            svc_metrics::record_claim_collision();
            return Ok(false);
        }

        let Some(state) = self.store.get_state(battle_id).await? else {
            error!(battle_id = %battle_id, "state vanished after TryMarkTurnResolving");
            return Ok(false);
        };

        let (action_a, action_b) = self.fetch_turn_actions(&state, turn_index).await?;

        let (new_state, events) = match fistfight_engine::resolve(&state, turn_index, action_a, action_b) {
            Ok(result) => result,
            Err(err) => {
                error!(battle_id = %battle_id, turn_index, error = %err, "domain engine rejected a precondition the service should have guaranteed");
                return Ok(false);
            }
        };

        let ends_battle = events.iter().any(|e| matches!(e, BattleEvent::BattleEnded { .. }));

        let result = if ends_battle {
            self.commit_end(battle_id, &state, &new_state, turn_index, &events).await
        } else {
            self.commit_turn_resolved(battle_id, &state, &new_state, turn_index, action_a, action_b, &events).await
        };
        svc_metrics::record_resolve_latency(resolve_started_at.elapsed());
        result
    }

    async fn fetch_turn_actions(
        &self,
        state: &BattleDomainState,
        turn_index: u64,
    ) -> Result<(PlayerAction, PlayerAction)> {
        let (raw_a, raw_b) = self
            .store
            .get_actions(&state.battle_id, turn_index, &state.player_a_id, &state.player_b_id)
            .await?;
        Ok((parse_stored_action(raw_a), parse_stored_action(raw_b)))
    }

    async fn commit_end(
        &self,
        battle_id: &BattleId,
        state: &BattleDomainState,
        new_state: &BattleDomainState,
        turn_index: u64,
        events: &[BattleEvent],
    ) -> Result<bool> {
        let reason = new_state.end_reason.unwrap_or(EndReason::SystemError);
        let winner = new_state.winner_player_id.clone();

        let outcome = self
            .store
            .end_battle_and_mark_resolved(
                battle_id,
                turn_index,
                new_state.no_action_streak_both,
                new_state.player_a.current_hp,
                new_state.player_b.current_hp,
                reason,
                winner.clone(),
            )
            .await?;

        match outcome {
            EndOutcome::EndedNow => {
                svc_metrics::record_battle_ended(reason);
                self.notify_player_damaged(battle_id, events, turn_index).await;
                let ended_at = self.clock.now();
                self.notifier
                    .publish(battle_id, RealtimeEvent::BattleEnded { battle_id: battle_id.clone(), reason, winner_player_id: winner.clone(), ended_at })
                    .await;
                self.bus
                    .publish_battle_ended(&BattleEndedMessage {
                        battle_id: battle_id.clone(),
                        match_id: state.match_id.clone(),
                        reason,
                        winner_player_id: winner,
                        ended_at,
                        version: new_state.version,
                    })
                    .await;
                Ok(true)
            }
            EndOutcome::AlreadyEnded => Ok(true),
            EndOutcome::NotCommitted => {
                error!(battle_id = %battle_id, turn_index, "EndBattleAndMarkResolved guard failed unexpectedly");
                Ok(false)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_turn_resolved(
        &self,
        battle_id: &BattleId,
        state: &BattleDomainState,
        new_state: &BattleDomainState,
        turn_index: u64,
        action_a: PlayerAction,
        action_b: PlayerAction,
        events: &[BattleEvent],
    ) -> Result<bool> {
        let next_turn = turn_index + 1;
        let next_deadline = self.clock.now().plus_seconds(state.ruleset.turn_seconds);

        let committed = self
            .store
            .mark_turn_resolved_and_open_next(
                battle_id,
                turn_index,
                next_turn,
                next_deadline,
                new_state.no_action_streak_both,
                new_state.player_a.current_hp,
                new_state.player_b.current_hp,
            )
            .await?;

        if !committed {
            error!(battle_id = %battle_id, turn_index, "MarkTurnResolvedAndOpenNext guard failed unexpectedly");
            return Ok(false);
        }

        svc_metrics::record_turn_resolved();

        let Some(reloaded) = self.store.get_state(battle_id).await? else {
            error!(battle_id = %battle_id, "state vanished after MarkTurnResolvedAndOpenNext");
            return Ok(false);
        };

        self.notify_player_damaged(battle_id, events, turn_index).await;
        self.notifier
            .publish(
                battle_id,
                RealtimeEvent::TurnResolved {
                    battle_id: battle_id.clone(),
                    turn_index,
                    action_a_desc: describe_action(action_a),
                    action_b_desc: describe_action(action_b),
                },
            )
            .await;
        // Deadline authority: the value pushed to clients is the one read
        // back from the store, not the one this call computed locally
        // (spec.md §4.7.2 "Deadline authority").
        self.notifier
            .publish(
                battle_id,
                RealtimeEvent::TurnOpened {
                    battle_id: battle_id.clone(),
                    turn_index: reloaded.turn_index,
                    deadline_utc: UtcMillis(reloaded.deadline_unix_ms),
                },
            )
            .await;
        self.notifier
            .publish(battle_id, RealtimeEvent::BattleStateUpdated { battle_id: battle_id.clone(), snapshot: BattleSnapshot::from_state(&reloaded) })
            .await;

        Ok(true)
    }

    async fn notify_player_damaged(&self, battle_id: &BattleId, events: &[BattleEvent], turn_index: u64) {
        for event in events {
            if let BattleEvent::PlayerDamaged { player_id, damage, remaining_hp, .. } = event {
                self.notifier
                    .publish(
                        battle_id,
                        RealtimeEvent::PlayerDamaged {
                            battle_id: battle_id.clone(),
                            player_id: player_id.clone(),
                            damage: *damage,
                            remaining_hp: *remaining_hp,
                            turn_index,
                        },
                    )
                    .await;
            }
        }
    }
}

fn parse_stored_action(raw: Option<Vec<u8>>) -> PlayerAction {
    match raw {
        None => PlayerAction::NoAction,
        Some(bytes) => serde_json::from_slice(&bytes).unwrap_or(PlayerAction::NoAction),
    }
}

fn describe_action(action: PlayerAction) -> String {
    match action {
        PlayerAction::NoAction => "no_action".to_string(),
        PlayerAction::Attack { attack_zone, block_zone_primary: None, .. } => format!("attack({attack_zone:?})"),
        PlayerAction::Attack { attack_zone, block_zone_primary: Some(primary), block_zone_secondary: None } => {
            format!("attack({attack_zone:?}) block({primary:?})")
        }
        PlayerAction::Attack { attack_zone, block_zone_primary: Some(primary), block_zone_secondary: Some(secondary) } => {
            format!("attack({attack_zone:?}) block({primary:?},{secondary:?})")
        }
    }
}

/// Actions are kept at least as long as the turn they were submitted for
/// could plausibly still be resolving, plus slack for a crashed worker's
/// lease to expire and a replacement to pick up the claim.
fn action_ttl_secs(state: &BattleDomainState) -> u64 {
    u64::from(state.ruleset.turn_seconds).saturating_mul(4).max(60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fistfight_engine::FixedClock;
    use fistfight_store::MemoryStore;
    use fistfight_types::{CombatBalance, MatchId, PlayerState, PlayerStats, Ruleset};

    fn player(id: &str) -> PlayerState {
        PlayerState {
            player_id: PlayerId::from(id),
            max_hp: 100,
            current_hp: 100,
            stats: PlayerStats { strength: 5.0, stamina: 10.0, agility: 0.0, intuition: 0.0 },
        }
    }

    fn zero_variance_balance() -> CombatBalance {
        let mut b = CombatBalance::default();
        b.dodge_chance_base = 0.0;
        b.dodge_chance_max = 0.0;
        b.crit_chance_base = 0.0;
        b.crit_chance_max = 0.0;
        b
    }

    fn turn_open_state(battle_id: &str, deadline_ms: i64) -> BattleDomainState {
        BattleDomainState {
            battle_id: BattleId::from(battle_id),
            match_id: MatchId::from("m1"),
            player_a_id: PlayerId::from("a"),
            player_b_id: PlayerId::from("b"),
            ruleset: Ruleset { version: 1, turn_seconds: 10, no_action_limit: 3, seed: 7, combat_balance: zero_variance_balance() },
            phase: Phase::TurnOpen,
            turn_index: 1,
            no_action_streak_both: 0,
            last_resolved_turn_index: 0,
            player_a: player("a"),
            player_b: player("b"),
            deadline_unix_ms: deadline_ms,
            version: 2,
            end_reason: None,
            winner_player_id: None,
        }
    }

    fn service(store: Arc<MemoryStore>, clock: Arc<FixedClock>) -> TurnService {
        TurnService::new(store, clock, Arc::new(crate::realtime::NullNotifier), Arc::new(crate::bus::NullEventBus))
    }

    #[tokio::test]
    async fn submit_action_unknown_battle_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(UtcMillis(0)));
        let svc = service(store, clock);
        let err = svc.submit_action(&BattleId::from("missing"), &PlayerId::from("a"), 1, b"{}").await.unwrap_err();
        assert!(matches!(err, ServiceError::BattleNotFound(_)));
    }

    #[tokio::test]
    async fn submit_action_by_non_participant_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let battle_id = BattleId::from("b1");
        store.try_initialize_battle(&battle_id, &turn_open_state("b1", 10_000)).await.unwrap();
        let clock = Arc::new(FixedClock::new(UtcMillis(0)));
        let svc = service(store, clock);
        let err = svc.submit_action(&battle_id, &PlayerId::from("stranger"), 1, b"{}").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotParticipant));
    }

    #[tokio::test]
    async fn both_actions_submitted_triggers_early_resolution() {
        let store = Arc::new(MemoryStore::new());
        let battle_id = BattleId::from("b1");
        store.try_initialize_battle(&battle_id, &turn_open_state("b1", 10_000)).await.unwrap();
        let clock = Arc::new(FixedClock::new(UtcMillis(1_000)));
        let svc = service(store.clone(), clock);

        let payload_a = br#"{"attackZone":"Head"}"#;
        let payload_b = br#"{"attackZone":"Chest"}"#;

        svc.submit_action(&battle_id, &PlayerId::from("a"), 1, payload_a).await.unwrap();
        let state_mid = store.get_state(&battle_id).await.unwrap().unwrap();
        assert_eq!(state_mid.turn_index, 1);

        svc.submit_action(&battle_id, &PlayerId::from("b"), 1, payload_b).await.unwrap();

        let state = store.get_state(&battle_id).await.unwrap().unwrap();
        assert_eq!(state.turn_index, 2);
        assert_eq!(state.last_resolved_turn_index, 1);
        assert_eq!(state.player_a.current_hp, 90);
        assert_eq!(state.player_b.current_hp, 90);
    }

    #[tokio::test]
    async fn late_submit_past_grace_normalizes_to_no_action() {
        let store = Arc::new(MemoryStore::new());
        let battle_id = BattleId::from("b1");
        store.try_initialize_battle(&battle_id, &turn_open_state("b1", 1_000)).await.unwrap();
        // Now well past deadline + grace.
        let clock = Arc::new(FixedClock::new(UtcMillis(5_000)));
        let svc = service(store.clone(), clock);

        svc.submit_action(&battle_id, &PlayerId::from("a"), 1, br#"{"attackZone":"Head"}"#).await.unwrap();

        let (raw_a, _) = store.get_actions(&battle_id, 1, &PlayerId::from("a"), &PlayerId::from("b")).await.unwrap();
        let stored: PlayerAction = serde_json::from_slice(&raw_a.unwrap()).unwrap();
        assert_eq!(stored, PlayerAction::NoAction);
    }

    #[tokio::test]
    async fn resolve_turn_is_idempotent_once_resolved() {
        let store = Arc::new(MemoryStore::new());
        let battle_id = BattleId::from("b1");
        store.try_initialize_battle(&battle_id, &turn_open_state("b1", 10_000)).await.unwrap();
        let clock = Arc::new(FixedClock::new(UtcMillis(1_000)));
        let svc = service(store.clone(), clock);

        svc.submit_action(&battle_id, &PlayerId::from("a"), 1, br#"{"attackZone":"Head"}"#).await.unwrap();
        svc.submit_action(&battle_id, &PlayerId::from("b"), 1, br#"{"attackZone":"Chest"}"#).await.unwrap();

        // Deadline worker wakes later and finds the turn already resolved.
        assert!(!svc.resolve_turn(&battle_id).await.unwrap());
    }

    #[tokio::test]
    async fn double_forfeit_ends_the_battle() {
        let store = Arc::new(MemoryStore::new());
        let battle_id = BattleId::from("b1");
        let mut state = turn_open_state("b1", 1_000);
        state.no_action_streak_both = 2;
        store.try_initialize_battle(&battle_id, &state).await.unwrap();

        let clock = Arc::new(FixedClock::new(UtcMillis(5_000)));
        let svc = service(store.clone(), clock);

        svc.submit_action(&battle_id, &PlayerId::from("a"), 1, b"").await.unwrap();
        assert!(svc.resolve_turn(&battle_id).await.unwrap());

        let final_state = store.get_state(&battle_id).await.unwrap().unwrap();
        assert_eq!(final_state.phase, Phase::Ended);
        assert_eq!(final_state.end_reason, Some(EndReason::DoubleForfeit));
    }
}
