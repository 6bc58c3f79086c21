//! Redis Streams transport for the Event Bus and the `CreateBattle` command
//! inbox (spec.md §6, §4.11, §4.12; SPEC_FULL.md §A). The store's own Redis
//! connection doubles as the bus transport: no message-bus crate appears
//! anywhere in the retrieval pack, and introducing a second external system
//! just for this would be a fabricated dependency.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fistfight_service::{BattleCreatedMessage, BattleEndedMessage, CommandConsumer, CreateBattleCommand, EventBus};
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{error, info, warn};

pub const CREATE_BATTLE_STREAM: &str = "bus:create_battle";
pub const BATTLE_CREATED_STREAM: &str = "bus:battle_created";
pub const BATTLE_ENDED_STREAM: &str = "bus:battle_ended";
const CONSUMER_GROUP: &str = "fistfight-server";
const PAYLOAD_FIELD: &str = "payload";

pub struct RedisEventBus {
    conn: ConnectionManager,
}

impl RedisEventBus {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish_battle_created(&self, message: &BattleCreatedMessage) {
        let payload = serde_json::to_string(message).expect("BattleCreatedMessage always serializes");
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<String> =
            conn.xadd(BATTLE_CREATED_STREAM, "*", &[(PAYLOAD_FIELD, payload.as_str())]).await;
        if let Err(err) = result {
            warn!(error = %err, "failed to publish BattleCreated onto the bus stream");
        }
    }

    async fn publish_battle_ended(&self, message: &BattleEndedMessage) {
        let payload = serde_json::to_string(message).expect("BattleEndedMessage always serializes");
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<String> =
            conn.xadd(BATTLE_ENDED_STREAM, "*", &[(PAYLOAD_FIELD, payload.as_str())]).await;
        if let Err(err) = result {
            warn!(error = %err, "failed to publish BattleEnded onto the bus stream");
        }
    }
}

/// Publishes a `CreateBattle` command onto the inbox stream. Used by the
/// CLI tool (and any future HTTP ingress), not by the server's own
/// `EventBus` implementation above.
pub async fn publish_create_battle(conn: &mut ConnectionManager, command: &CreateBattleCommand) -> redis::RedisResult<()> {
    let payload = serde_json::to_string(command).expect("CreateBattleCommand always serializes");
    let _id: String = conn.xadd(CREATE_BATTLE_STREAM, "*", &[(PAYLOAD_FIELD, payload.as_str())]).await?;
    Ok(())
}

/// Ensures the consumer group exists, tolerating `BUSYGROUP` (already
/// created by a prior run or a sibling replica).
pub async fn ensure_consumer_group(conn: &mut ConnectionManager) -> redis::RedisResult<()> {
    let result: redis::RedisResult<()> = conn.xgroup_create_mkstream(CREATE_BATTLE_STREAM, CONSUMER_GROUP, "0").await;
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.to_string().contains("BUSYGROUP") => Ok(()),
        Err(err) => Err(err),
    }
}

/// The Command Consumer's read loop (spec.md §4.12): `XREADGROUP` off the
/// `CreateBattle` inbox, handle, `XACK`. Delivery is at-least-once — a
/// crash between handling and acking redelivers the same command, which
/// `CommandConsumer` already treats as idempotent on `battle_id`.
pub async fn run_command_consumer_loop(
    mut conn: ConnectionManager,
    consumer_name: String,
    consumer: Arc<CommandConsumer>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let opts = StreamReadOptions::default().group(CONSUMER_GROUP, &consumer_name).count(10).block(2_000);

    loop {
        if *shutdown.borrow() {
            info!("command consumer loop shutting down");
            return;
        }

        let reply: redis::RedisResult<StreamReadReply> = tokio::select! {
            reply = conn.xread_options(&[CREATE_BATTLE_STREAM], &[">"], &opts) => reply,
            _ = shutdown.changed() => continue,
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                error!(error = %err, "XREADGROUP failed, backing off");
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
        };

        for stream_key in reply.keys {
            for entry in stream_key.ids {
                let raw: Option<Vec<u8>> =
                    entry.map.get(PAYLOAD_FIELD).and_then(|value| redis::from_redis_value::<Vec<u8>>(value).ok());

                let Some(raw) = raw else {
                    warn!(entry_id = %entry.id, "stream entry missing payload field, acking and skipping");
                    let _: redis::RedisResult<i64> = conn.xack(CREATE_BATTLE_STREAM, CONSUMER_GROUP, &[entry.id.as_str()]).await;
                    continue;
                };

                match serde_json::from_slice::<CreateBattleCommand>(&raw) {
                    Ok(command) => {
                        if let Err(err) = consumer.handle_create_battle(&command).await {
                            error!(battle_id = %command.battle_id, error = %err, "handle_create_battle failed, leaving unacked for redelivery");
                            continue;
                        }
                    }
                    Err(err) => {
                        error!(entry_id = %entry.id, error = %err, "undecodable CreateBattle payload, acking to avoid a poison message");
                    }
                }

                let _: redis::RedisResult<i64> = conn.xack(CREATE_BATTLE_STREAM, CONSUMER_GROUP, &[entry.id.as_str()]).await;
            }
        }
    }
}
