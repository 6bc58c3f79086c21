//! Deadline Worker — the long-running claim loop (spec.md §4.9).
//!
//! Scheduling model: any number of replicas may run this loop
//! concurrently, in-process or across processes; the only shared mutable
//! state is the store, and `ClaimDueBattles` is the single atomic script
//! that prevents two workers from claiming the same `(battleId,
//! turnIndex)` (spec.md §5).

use std::sync::Arc;
use std::time::Duration;

use fistfight_engine::Clock;
use fistfight_store::StateStore;
use tracing::{error, info, warn};

use crate::turn_service::TurnService;

#[derive(Debug, Clone, Copy)]
pub struct DeadlineWorkerConfig {
    pub batch_size: usize,
    pub lease_ttl_ms: i64,
    pub claim_reschedule_delay_ms: i64,
    pub backlog_delay_ms: u64,
    pub idle_delay_min_ms: u64,
    pub idle_delay_max_ms: u64,
    pub error_delay_ms: u64,
    /// Consecutive transient errors before a warning summary is logged.
    pub error_warn_threshold: u32,
}

impl Default for DeadlineWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            lease_ttl_ms: 12_000,
            claim_reschedule_delay_ms: 250,
            backlog_delay_ms: 30,
            idle_delay_min_ms: 200,
            idle_delay_max_ms: 1_000,
            error_delay_ms: 500,
            error_warn_threshold: 5,
        }
    }
}

pub struct DeadlineWorker {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    turn_service: Arc<TurnService>,
    config: DeadlineWorkerConfig,
}

impl DeadlineWorker {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, turn_service: Arc<TurnService>, config: DeadlineWorkerConfig) -> Self {
        Self { store, clock, turn_service, config }
    }

    /// Runs until `shutdown` resolves. The deadline worker is the sole
    /// owner of this loop-wide cancellation (spec.md §5); it stops
    /// cleanly between iterations, never mid-claim.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut idle_delay_ms = self.config.idle_delay_min_ms;
        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("deadline worker shutting down");
                return;
            }

            match self.run_iteration().await {
                Ok(claimed_count) => {
                    consecutive_errors = 0;
                    if claimed_count > 0 {
                        idle_delay_ms = self.config.idle_delay_min_ms;
                        self.sleep_or_shutdown(Duration::from_millis(self.config.backlog_delay_ms), &mut shutdown).await;
                    } else {
                        self.sleep_or_shutdown(Duration::from_millis(idle_delay_ms), &mut shutdown).await;
                        idle_delay_ms = (idle_delay_ms * 2).min(self.config.idle_delay_max_ms);
                    }
                }
                Err(err) => {
                    consecutive_errors += 1;
                    if consecutive_errors == self.config.error_warn_threshold {
                        warn!(consecutive_errors, "deadline worker has hit repeated transient errors");
                    }
                    error!(error = %err, "deadline worker iteration failed");
                    self.sleep_or_shutdown(Duration::from_millis(self.config.error_delay_ms), &mut shutdown).await;
                }
            }
        }
    }

    async fn sleep_or_shutdown(&self, delay: Duration, shutdown: &mut tokio::sync::watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {}
        }
    }

    async fn run_iteration(&self) -> fistfight_store::Result<usize> {
        let now = self.clock.now();
        let claimed = self
            .store
            .claim_due_battles(now, self.config.batch_size, self.config.lease_ttl_ms, self.config.claim_reschedule_delay_ms)
            .await?;

        for claim in &claimed {
            // Lease safety: if this worker crashes mid-resolve, the lease
            // expires and the score reverts to due; `ResolveTurn` is
            // CAS-guarded so a redundant reclaim just returns false
            // (spec.md §4.9, §8 property 10).
            match self.turn_service.resolve_turn(&claim.battle_id).await {
                Ok(_) => {}
                Err(err) => {
                    warn!(battle_id = %claim.battle_id, turn_index = claim.turn_index, error = %err, "resolve_turn failed for a claimed battle");
                }
            }
        }

        Ok(claimed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::NullEventBus;
    use crate::realtime::NullNotifier;
    use fistfight_engine::FixedClock;
    use fistfight_store::MemoryStore;
    use fistfight_types::{BattleDomainState, CombatBalance, MatchId, Phase, PlayerId, PlayerState, PlayerStats, Ruleset, UtcMillis};

    fn turn_open_state(deadline_ms: i64) -> BattleDomainState {
        BattleDomainState {
            battle_id: fistfight_types::BattleId::from("b1"),
            match_id: MatchId::from("m1"),
            player_a_id: PlayerId::from("a"),
            player_b_id: PlayerId::from("b"),
            ruleset: Ruleset { version: 1, turn_seconds: 10, no_action_limit: 2, seed: 1, combat_balance: CombatBalance::default() },
            phase: Phase::TurnOpen,
            turn_index: 1,
            no_action_streak_both: 1,
            last_resolved_turn_index: 0,
            player_a: PlayerState {
                player_id: PlayerId::from("a"),
                max_hp: 100,
                current_hp: 100,
                stats: PlayerStats { strength: 5.0, stamina: 10.0, agility: 0.0, intuition: 0.0 },
            },
            player_b: PlayerState {
                player_id: PlayerId::from("b"),
                max_hp: 100,
                current_hp: 100,
                stats: PlayerStats { strength: 5.0, stamina: 10.0, agility: 0.0, intuition: 0.0 },
            },
            deadline_unix_ms: deadline_ms,
            version: 2,
            end_reason: None,
            winner_player_id: None,
        }
    }

    #[tokio::test]
    async fn claims_and_resolves_a_due_no_action_turn() {
        let store = Arc::new(MemoryStore::new());
        let battle_id = fistfight_types::BattleId::from("b1");
        store.try_initialize_battle(&battle_id, &turn_open_state(1_000)).await.unwrap();

        let clock = Arc::new(FixedClock::new(UtcMillis(2_000)));
        let turn_service =
            Arc::new(TurnService::new(store.clone(), clock.clone(), Arc::new(NullNotifier), Arc::new(NullEventBus)));
        let worker = DeadlineWorker::new(store.clone(), clock, turn_service, DeadlineWorkerConfig::default());

        let claimed = worker.run_iteration().await.unwrap();
        assert_eq!(claimed, 1);

        let state = store.get_state(&battle_id).await.unwrap().unwrap();
        // no_action_streak_both started at 1, limit is 2: this resolution
        // (both players silent) should end the battle by double forfeit.
        assert_eq!(state.phase, Phase::Ended);
        assert_eq!(state.end_reason, Some(fistfight_types::EndReason::DoubleForfeit));
    }

    #[tokio::test]
    async fn nothing_due_claims_zero() {
        let store = Arc::new(MemoryStore::new());
        let battle_id = fistfight_types::BattleId::from("b1");
        store.try_initialize_battle(&battle_id, &turn_open_state(10_000)).await.unwrap();

        let clock = Arc::new(FixedClock::new(UtcMillis(1_000)));
        let turn_service =
            Arc::new(TurnService::new(store.clone(), clock.clone(), Arc::new(NullNotifier), Arc::new(NullEventBus)));
        let worker = DeadlineWorker::new(store, clock, turn_service, DeadlineWorkerConfig::default());

        assert_eq!(worker.run_iteration().await.unwrap(), 0);
    }
}
