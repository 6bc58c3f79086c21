//! Redis-backed implementation of `StateStore` (spec.md §4.5).
//!
//! Every mutating operation is a single `EVALSHA`'d Lua script (see
//! `scripts`), so Redis's single-threaded command execution is the
//! compare-and-swap primitive the spec requires — no client-side locking
//! is involved anywhere in this file.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fistfight_types::{BattleDomainState, BattleId, EndReason, PlayerId, UtcMillis};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{instrument, warn};

use crate::error::{Result, StoreError};
use crate::idempotency::CommandIdempotency;
use crate::keys::{action_key, command_created_key, lock_key, state_key, ACTIVE_SET_KEY, DEADLINES_ZSET_KEY};
use crate::model::{ClaimedBattle, EndOutcome, InitOutcome, StoreActionOutcome};
use crate::scripts;
use crate::state_store::StateStore;

/// Command Consumer idempotency anchor TTL: long enough that a bus
/// redelivery window never outlives it, short enough not to accumulate
/// forever (spec.md §4.12, SPEC_FULL.md §C).
const COMMAND_IDEMPOTENCY_TTL_SECS: u64 = 7 * 24 * 60 * 60;

const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Retries `op` on `StoreError::TransportTransient`, matching spec.md §4.5
/// ("every operation retries on transient connection errors"); any other
/// error aborts immediately without partial state changes.
async fn with_retry<T, F, Fut>(op_name: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(StoreError::TransportTransient(err)) if attempt < MAX_RETRIES => {
                attempt += 1;
                warn!(op = op_name, attempt, error = %err, "transient store error, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

pub struct RedisStore {
    conn: ConnectionManager,
    try_initialize_battle: Script,
    try_open_turn: Script,
    try_mark_turn_resolving: Script,
    mark_turn_resolved_and_open_next: Script,
    end_battle_and_mark_resolved: Script,
    claim_due_battles: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            try_initialize_battle: Script::new(scripts::TRY_INITIALIZE_BATTLE),
            try_open_turn: Script::new(scripts::TRY_OPEN_TURN),
            try_mark_turn_resolving: Script::new(scripts::TRY_MARK_TURN_RESOLVING),
            mark_turn_resolved_and_open_next: Script::new(scripts::MARK_TURN_RESOLVED_AND_OPEN_NEXT),
            end_battle_and_mark_resolved: Script::new(scripts::END_BATTLE_AND_MARK_RESOLVED),
            claim_due_battles: Script::new(scripts::CLAIM_DUE_BATTLES),
        }
    }

    fn encode_state(battle_id: &BattleId, state: &BattleDomainState) -> Result<String> {
        serde_json::to_string(state).map_err(|e| StoreError::EncodeFailed(battle_id.clone(), e))
    }
}

#[async_trait]
impl StateStore for RedisStore {
    #[instrument(skip(self, initial_state), fields(battle_id = %battle_id))]
    async fn try_initialize_battle(
        &self,
        battle_id: &BattleId,
        initial_state: &BattleDomainState,
    ) -> Result<InitOutcome> {
        let payload = Self::encode_state(battle_id, initial_state)?;
        with_retry("try_initialize_battle", || async {
            let mut conn = self.conn.clone();
            let created: i32 = self
                .try_initialize_battle
                .key(state_key(battle_id))
                .key(ACTIVE_SET_KEY)
                .arg(&payload)
                .arg(battle_id.as_str())
                .invoke_async(&mut conn)
                .await?;
            Ok(if created == 1 { InitOutcome::Created } else { InitOutcome::AlreadyExists })
        })
        .await
    }

    #[instrument(skip(self), fields(battle_id = %battle_id))]
    async fn get_state(&self, battle_id: &BattleId) -> Result<Option<BattleDomainState>> {
        with_retry("get_state", || async {
            let mut conn = self.conn.clone();
            let raw: Option<String> = conn.get(state_key(battle_id)).await?;
            match raw {
                None => Ok(None),
                Some(raw) => serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|_| StoreError::StateCorrupted(battle_id.clone())),
            }
        })
        .await
    }

    #[instrument(skip(self), fields(battle_id = %battle_id, turn_index))]
    async fn try_open_turn(&self, battle_id: &BattleId, turn_index: u64, deadline: UtcMillis) -> Result<bool> {
        with_retry("try_open_turn", || async {
            let mut conn = self.conn.clone();
            let ok: i32 = self
                .try_open_turn
                .key(state_key(battle_id))
                .key(DEADLINES_ZSET_KEY)
                .arg(turn_index)
                .arg(deadline.0)
                .arg(battle_id.as_str())
                .invoke_async(&mut conn)
                .await?;
            Ok(ok == 1)
        })
        .await
    }

    #[instrument(skip(self), fields(battle_id = %battle_id, turn_index))]
    async fn try_mark_turn_resolving(&self, battle_id: &BattleId, turn_index: u64) -> Result<bool> {
        with_retry("try_mark_turn_resolving", || async {
            let mut conn = self.conn.clone();
            let ok: i32 = self
                .try_mark_turn_resolving
                .key(state_key(battle_id))
                .arg(turn_index)
                .invoke_async(&mut conn)
                .await?;
            Ok(ok == 1)
        })
        .await
    }

    #[instrument(skip(self), fields(battle_id = %battle_id, cur_turn))]
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
        with_retry("mark_turn_resolved_and_open_next", || async {
            let mut conn = self.conn.clone();
            let ok: i32 = self
                .mark_turn_resolved_and_open_next
                .key(state_key(battle_id))
                .key(DEADLINES_ZSET_KEY)
                .arg(cur_turn)
                .arg(next_turn)
                .arg(next_deadline.0)
                .arg(no_action_streak)
                .arg(hp_a)
                .arg(hp_b)
                .arg(battle_id.as_str())
                .invoke_async(&mut conn)
                .await?;
            Ok(ok == 1)
        })
        .await
    }

    #[instrument(skip(self), fields(battle_id = %battle_id, turn_index))]
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
        let reason_str = serde_json::to_value(reason)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        let winner_str = winner_player_id.map(|p| p.as_str().to_owned()).unwrap_or_default();

        with_retry("end_battle_and_mark_resolved", || async {
            let mut conn = self.conn.clone();
            let outcome: i32 = self
                .end_battle_and_mark_resolved
                .key(state_key(battle_id))
                .key(ACTIVE_SET_KEY)
                .key(DEADLINES_ZSET_KEY)
                .arg(turn_index)
                .arg(no_action_streak)
                .arg(hp_a)
                .arg(hp_b)
                .arg(battle_id.as_str())
                .arg(&reason_str)
                .arg(&winner_str)
                .invoke_async(&mut conn)
                .await?;
            Ok(match outcome {
                2 => EndOutcome::EndedNow,
                1 => EndOutcome::AlreadyEnded,
                _ => EndOutcome::NotCommitted,
            })
        })
        .await
    }

    #[instrument(skip(self))]
    async fn claim_due_battles(
        &self,
        now: UtcMillis,
        limit: usize,
        lease_ttl_ms: i64,
        small_delay_ms: i64,
    ) -> Result<Vec<ClaimedBattle>> {
        with_retry("claim_due_battles", || async {
            let mut conn = self.conn.clone();
            let flat: Vec<String> = self
                .claim_due_battles
                .key(DEADLINES_ZSET_KEY)
                .arg(now.0)
                .arg(limit)
                .arg(lease_ttl_ms)
                .arg(small_delay_ms)
                .invoke_async(&mut conn)
                .await?;

            Ok(flat
                .chunks_exact(2)
                .filter_map(|pair| {
                    let turn_index = pair[1].parse::<u64>().ok()?;
                    Some(ClaimedBattle { battle_id: BattleId::from(pair[0].clone()), turn_index })
                })
                .collect())
        })
        .await
    }

    #[instrument(skip(self, payload), fields(battle_id = %battle_id, turn_index, player_id = %player_id))]
    async fn store_action(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        player_id: &PlayerId,
        payload: &[u8],
        ttl_secs: u64,
    ) -> Result<StoreActionOutcome> {
        with_retry("store_action", || async {
            let mut conn = self.conn.clone();
            let key = action_key(battle_id, turn_index, player_id);
            let accepted: bool = redis::cmd("SET")
                .arg(&key)
                .arg(payload)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs)
                .query_async::<Option<String>>(&mut conn)
                .await
                .map(|v| v.is_some())?;
            Ok(if accepted { StoreActionOutcome::Accepted } else { StoreActionOutcome::AlreadySubmitted })
        })
        .await
    }

    #[instrument(skip(self), fields(battle_id = %battle_id, turn_index))]
    async fn get_actions(
        &self,
        battle_id: &BattleId,
        turn_index: u64,
        player_a_id: &PlayerId,
        player_b_id: &PlayerId,
    ) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>)> {
        with_retry("get_actions", || async {
            let mut conn = self.conn.clone();
            let a: Option<Vec<u8>> = conn.get(action_key(battle_id, turn_index, player_a_id)).await?;
            let b: Option<Vec<u8>> = conn.get(action_key(battle_id, turn_index, player_b_id)).await?;
            Ok((a, b))
        })
        .await
    }
}

#[async_trait]
impl CommandIdempotency for RedisStore {
    #[instrument(skip(self), fields(battle_id = %battle_id))]
    async fn try_mark_command_created(&self, battle_id: &BattleId) -> Result<bool> {
        with_retry("try_mark_command_created", || async {
            let mut conn = self.conn.clone();
            let created: Option<String> = redis::cmd("SET")
                .arg(command_created_key(battle_id))
                .arg(1)
                .arg("NX")
                .arg("EX")
                .arg(COMMAND_IDEMPOTENCY_TTL_SECS)
                .query_async(&mut conn)
                .await?;
            Ok(created.is_some())
        })
        .await
    }
}

/// Also usable for the `lock:...` key probe in tests/tooling that want to
/// assert a lease is held without going through `ClaimDueBattles`.
pub async fn lock_is_held(conn: &mut ConnectionManager, battle_id: &BattleId, turn_index: u64) -> Result<bool> {
    let exists: bool = conn.exists(lock_key(battle_id, turn_index)).await?;
    Ok(exists)
}
