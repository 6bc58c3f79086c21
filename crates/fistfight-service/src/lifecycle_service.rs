//! Lifecycle Service — `HandleBattleCreated` (spec.md §4.8).
//!
//! Every step is idempotent and none depends on a previous call's return
//! value for correctness: re-delivering the same `BattleCreated` message
//! any number of times converges on the same result (spec.md §5, S5).

use std::sync::Arc;

use fistfight_engine::Clock;
use fistfight_engine::combat_math::derive_stats;
use fistfight_store::StateStore;
use fistfight_types::{BattleDomainState, Phase, PlayerState};
use tracing::warn;

use crate::bus::BattleCreatedMessage;
use crate::error::Result;
use crate::profile::PlayerProfileProvider;
use crate::realtime::RealtimeEvent;
use crate::realtime::RealtimeNotifier;

pub struct LifecycleService {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn RealtimeNotifier>,
    profiles: Arc<dyn PlayerProfileProvider>,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn RealtimeNotifier>,
        profiles: Arc<dyn PlayerProfileProvider>,
    ) -> Self {
        Self { store, clock, notifier, profiles }
    }

    #[tracing::instrument(skip(self, message), fields(battle_id = %message.battle_id))]
    pub async fn handle_battle_created(&self, message: &BattleCreatedMessage) -> Result<()> {
        if let Err(err) = message.ruleset.validate() {
            warn!(battle_id = %message.battle_id, error = %err, "rejecting battle with invalid ruleset, acknowledging");
            return Ok(());
        }

        let Some(profile_a) = self.profiles.get_profile(&message.player_a_id).await else {
            warn!(battle_id = %message.battle_id, player_id = %message.player_a_id, "player profile missing, acknowledging without creating state");
            return Ok(());
        };
        let Some(profile_b) = self.profiles.get_profile(&message.player_b_id).await else {
            warn!(battle_id = %message.battle_id, player_id = %message.player_b_id, "player profile missing, acknowledging without creating state");
            return Ok(());
        };

        let balance = &message.ruleset.combat_balance;
        let derived_a = derive_stats(&profile_a.stats, balance);
        let derived_b = derive_stats(&profile_b.stats, balance);

        let initial_state = BattleDomainState {
            battle_id: message.battle_id.clone(),
            match_id: message.match_id.clone(),
            player_a_id: message.player_a_id.clone(),
            player_b_id: message.player_b_id.clone(),
            ruleset: message.ruleset.clone(),
            phase: Phase::ArenaOpen,
            turn_index: 0,
            no_action_streak_both: 0,
            last_resolved_turn_index: 0,
            player_a: PlayerState {
                player_id: message.player_a_id.clone(),
                max_hp: derived_a.hp_max,
                current_hp: derived_a.hp_max,
                stats: profile_a.stats,
            },
            player_b: PlayerState {
                player_id: message.player_b_id.clone(),
                max_hp: derived_b.hp_max,
                current_hp: derived_b.hp_max,
                stats: profile_b.stats,
            },
            deadline_unix_ms: 0,
            version: 1,
            end_reason: None,
            winner_player_id: None,
        };

        // Return value intentionally unused: whether this call created the
        // row or found it already there, the next step is the same.
        self.store.try_initialize_battle(&message.battle_id, &initial_state).await?;

        let deadline = self.clock.now().plus_seconds(message.ruleset.turn_seconds);
        let opened_turn_one = self.store.try_open_turn(&message.battle_id, 1, deadline).await?;

        if !opened_turn_one {
            // Another worker already converged this battle past ArenaOpen,
            // or past turn 1 entirely. Nothing left to announce.
            return Ok(());
        }

        let Some(reloaded) = self.store.get_state(&message.battle_id).await? else {
            return Ok(());
        };

        self.notifier
            .publish(
                &message.battle_id,
                RealtimeEvent::BattleReady {
                    battle_id: message.battle_id.clone(),
                    player_a_id: message.player_a_id.clone(),
                    player_b_id: message.player_b_id.clone(),
                },
            )
            .await;
        self.notifier
            .publish(
                &message.battle_id,
                RealtimeEvent::TurnOpened {
                    battle_id: message.battle_id.clone(),
                    turn_index: reloaded.turn_index,
                    deadline_utc: fistfight_types::UtcMillis(reloaded.deadline_unix_ms),
                },
            )
            .await;

        Ok(())
    }
}
