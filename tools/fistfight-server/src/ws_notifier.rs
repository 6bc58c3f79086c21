//! Realtime Notifier transport: an axum WebSocket gateway implementing the
//! `JoinBattle`/`SubmitTurnAction` client protocol (spec.md §6), grounded on
//! `mk-server`'s one-socket-per-session WebSocket handler. Unlike
//! `mk-server`, this protocol has a server-initiated push side (turn
//! resolution, damage, battle end), so each connection splits its socket
//! into a reader loop and a single writer task fed by an mpsc channel.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use dashmap::DashMap;
use fistfight_service::{BattleSnapshot, RealtimeEvent, RealtimeNotifier, ServiceError, TurnService};
use fistfight_store::StateStore;
use fistfight_types::{BattleId, PlayerId};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

const CHANNEL_CAPACITY: usize = 256;

/// In-process fan-out registry: one broadcast channel per battle id. This
/// is the only in-process shared mutable state this server keeps
/// (spec.md §5) — it is a pure cache of "who's listening right now", never
/// a source of truth, and is safe to lose on restart.
pub struct WsNotifier {
    channels: DashMap<BattleId, broadcast::Sender<RealtimeEvent>>,
}

impl WsNotifier {
    pub fn new() -> Self {
        Self { channels: DashMap::new() }
    }

    fn sender_for(&self, battle_id: &BattleId) -> broadcast::Sender<RealtimeEvent> {
        self.channels.entry(battle_id.clone()).or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0).clone()
    }

    fn subscribe(&self, battle_id: &BattleId) -> broadcast::Receiver<RealtimeEvent> {
        self.sender_for(battle_id).subscribe()
    }
}

impl Default for WsNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeNotifier for WsNotifier {
    async fn publish(&self, battle_id: &BattleId, event: RealtimeEvent) {
        // A send error just means nobody is currently subscribed; spec.md
        // §4.10 treats delivery as best-effort, a client refetches the
        // full snapshot on the next JoinBattle.
        let _ = self.sender_for(battle_id).send(event);
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    JoinBattle { battle_id: BattleId, player_id: PlayerId },
    SubmitTurnAction { battle_id: BattleId, player_id: PlayerId, turn_index: u64, payload: serde_json::Value },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Snapshot { battle_id: BattleId, snapshot: BattleSnapshot },
    Ack { battle_id: BattleId, turn_index: u64 },
    Error { message: String },
}

pub struct GatewayState {
    pub store: Arc<dyn StateStore>,
    pub turn_service: Arc<TurnService>,
    pub notifier: Arc<WsNotifier>,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sink, mut stream) = socket.split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut forwarder: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                send(&outbox_tx, &ServerMessage::Error { message: format!("invalid message: {e}") });
                continue;
            }
        };

        match client_msg {
            ClientMessage::JoinBattle { battle_id, player_id } => {
                if let Some(handle) = forwarder.take() {
                    handle.abort();
                }
                match state.store.get_state(&battle_id).await {
                    Ok(Some(battle_state)) => {
                        if player_id != battle_state.player_a_id && player_id != battle_state.player_b_id {
                            send(&outbox_tx, &ServerMessage::Error { message: "User is not a participant in this battle".to_string() });
                            continue;
                        }
                        let snapshot = BattleSnapshot::from_state(&battle_state);
                        send(&outbox_tx, &ServerMessage::Snapshot { battle_id: battle_id.clone(), snapshot });
                        forwarder = Some(spawn_forwarder(state.notifier.subscribe(&battle_id), outbox_tx.clone()));
                    }
                    Ok(None) => {
                        send(&outbox_tx, &ServerMessage::Error { message: format!("battle {battle_id} not found") });
                    }
                    Err(err) => {
                        warn!(battle_id = %battle_id, error = %err, "store lookup failed during JoinBattle");
                        send(&outbox_tx, &ServerMessage::Error { message: "internal error".to_string() });
                    }
                }
            }
            ClientMessage::SubmitTurnAction { battle_id, player_id, turn_index, payload } => {
                let bytes = serde_json::to_vec(&payload).unwrap_or_default();
                match state.turn_service.submit_action(&battle_id, &player_id, turn_index, &bytes).await {
                    Ok(()) => send(&outbox_tx, &ServerMessage::Ack { battle_id, turn_index }),
                    Err(ServiceError::Store(err)) => {
                        warn!(battle_id = %battle_id, error = %err, "store error while submitting action");
                        send(&outbox_tx, &ServerMessage::Error { message: "internal error".to_string() });
                    }
                    Err(err) => send(&outbox_tx, &ServerMessage::Error { message: err.to_string() }),
                }
            }
        }
    }

    if let Some(handle) = forwarder.take() {
        handle.abort();
    }
    writer.abort();
}

fn spawn_forwarder(mut receiver: broadcast::Receiver<RealtimeEvent>, outbox: mpsc::UnboundedSender<Message>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).expect("RealtimeEvent always serializes");
                    if outbox.send(Message::Text(json.into())).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn send(outbox: &mpsc::UnboundedSender<Message>, msg: &ServerMessage) {
    let json = serde_json::to_string(msg).expect("ServerMessage always serializes");
    let _ = outbox.send(Message::Text(json.into()));
}
