//! Command Consumer — ingests `CreateBattle` from the bus (spec.md §4.12).
//!
//! Idempotency is anchored on `battle_id` via the store's
//! `CommandIdempotency` port (SPEC_FULL.md §C). Duplicate commands
//! (scenario S5) always resolve to the same `battle_id`, and the
//! Lifecycle Service converges regardless of how many times it's invoked.

use std::sync::Arc;

use fistfight_store::CommandIdempotency;
use tracing::info;

use crate::bus::{BattleCreatedMessage, CreateBattleCommand, EventBus};
use crate::error::Result;
use crate::lifecycle_service::LifecycleService;

pub struct CommandConsumer {
    idempotency: Arc<dyn CommandIdempotency>,
    bus: Arc<dyn EventBus>,
    lifecycle: Arc<LifecycleService>,
}

impl CommandConsumer {
    pub fn new(idempotency: Arc<dyn CommandIdempotency>, bus: Arc<dyn EventBus>, lifecycle: Arc<LifecycleService>) -> Self {
        Self { idempotency, bus, lifecycle }
    }

    #[tracing::instrument(skip(self, command), fields(battle_id = %command.battle_id))]
    pub async fn handle_create_battle(&self, command: &CreateBattleCommand) -> Result<()> {
        let is_first_delivery = self.idempotency.try_mark_command_created(&command.battle_id).await?;
        if is_first_delivery {
            info!(battle_id = %command.battle_id, "first delivery of CreateBattle, recording and publishing BattleCreated");
        } else {
            info!(battle_id = %command.battle_id, "redelivered CreateBattle, no-op on the idempotency anchor");
        }

        let message = BattleCreatedMessage::from_command(command);
        // Published unconditionally: downstream projectors are expected
        // to be idempotent on `battle_id`, same as the bus's at-least-once
        // delivery contract (spec.md §4.11).
        self.bus.publish_battle_created(&message).await;

        self.lifecycle.handle_battle_created(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::StaticProfileProvider;
    use crate::realtime::NullNotifier;
    use fistfight_engine::FixedClock;
    use fistfight_store::MemoryStore;
    use fistfight_types::{BattleId, CombatBalance, MatchId, PlayerId, PlayerStats, Ruleset, UtcMillis};

    fn command() -> CreateBattleCommand {
        CreateBattleCommand {
            battle_id: BattleId::from("b1"),
            match_id: MatchId::from("m1"),
            player_a_id: PlayerId::from("a"),
            player_b_id: PlayerId::from("b"),
            ruleset: Ruleset { version: 1, turn_seconds: 10, no_action_limit: 3, seed: 1, combat_balance: CombatBalance::default() },
            requested_at: UtcMillis(0),
        }
    }

    #[tokio::test]
    async fn duplicate_create_battle_converges_to_one_state() {
        let store = Arc::new(MemoryStore::new());
        let stats = PlayerStats { strength: 5.0, stamina: 10.0, agility: 0.0, intuition: 0.0 };
        let profiles = Arc::new(
            StaticProfileProvider::new().with_profile(PlayerId::from("a"), stats).with_profile(PlayerId::from("b"), stats),
        );
        let lifecycle = Arc::new(LifecycleService::new(
            store.clone(),
            Arc::new(FixedClock::new(UtcMillis(0))),
            Arc::new(NullNotifier),
            profiles,
        ));
        let consumer = CommandConsumer::new(store.clone(), Arc::new(crate::bus::NullEventBus), lifecycle);

        let cmd = command();
        consumer.handle_create_battle(&cmd).await.unwrap();
        consumer.handle_create_battle(&cmd).await.unwrap();

        let state = store.get_state(&cmd.battle_id).await.unwrap().unwrap();
        assert_eq!(state.turn_index, 1);
        assert_eq!(state.phase, fistfight_types::Phase::TurnOpen);
    }
}
