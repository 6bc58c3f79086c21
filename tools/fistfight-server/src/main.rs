//! Battle server binary: HTTP/WebSocket gateway, Redis-backed state store,
//! Redis Streams command consumer, and the deadline worker, all in one
//! process (spec.md §4, §6; SPEC_FULL.md §A, §D). Grounded on
//! `tools/mk-server/src/main.rs`'s route layout and `#[tokio::main]`
//! single-process shape, extended with the background workers this
//! system's deadline-driven design requires.

mod config;
mod profile_stub;
mod redis_bus;
mod ws_notifier;

use std::sync::Arc;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use fistfight_engine::SystemClock;
use fistfight_service::{CommandConsumer, DeadlineWorker, DeadlineWorkerConfig, LifecycleService, TurnService};
use fistfight_store::RedisStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::profile_stub::DefaultStatsProfileProvider;
use crate::redis_bus::RedisEventBus;
use crate::ws_notifier::{ws_handler, GatewayState, WsNotifier};

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html><head><title>fistfight-server</title></head>
<body>
<h1>fistfight battle server</h1>
<p>Connect via WebSocket at <code>/ws</code>. Send <code>{"type":"join_battle","battleId":"...","playerId":"..."}</code> first.</p>
</body></html>"#,
    )
}

async fn health() -> &'static str {
    "fistfight-server ok"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    let config = Config::from_env();
    let prometheus_handle = PrometheusBuilder::new().install_recorder().expect("failed to install Prometheus recorder");

    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("invalid REDIS_URL");
    let store_conn = redis_client.get_connection_manager().await.expect("failed to connect to redis for the state store");
    let bus_conn = redis_client.get_connection_manager().await.expect("failed to connect to redis for the bus");
    let mut consumer_conn = redis_client.get_connection_manager().await.expect("failed to connect to redis for the command consumer");

    redis_bus::ensure_consumer_group(&mut consumer_conn).await.expect("failed to create the CreateBattle consumer group");

    let store = Arc::new(RedisStore::from_connection(store_conn));
    let clock = Arc::new(SystemClock);
    let notifier = Arc::new(WsNotifier::new());
    let bus = Arc::new(RedisEventBus::new(bus_conn));
    let profiles = Arc::new(DefaultStatsProfileProvider::default());

    let turn_service = Arc::new(TurnService::new(
        store.clone() as Arc<dyn fistfight_store::StateStore>,
        clock.clone() as Arc<dyn fistfight_engine::Clock>,
        notifier.clone() as Arc<dyn fistfight_service::RealtimeNotifier>,
        bus.clone() as Arc<dyn fistfight_service::EventBus>,
    ));
    let lifecycle_service = Arc::new(LifecycleService::new(
        store.clone() as Arc<dyn fistfight_store::StateStore>,
        clock.clone() as Arc<dyn fistfight_engine::Clock>,
        notifier.clone() as Arc<dyn fistfight_service::RealtimeNotifier>,
        profiles as Arc<dyn fistfight_service::PlayerProfileProvider>,
    ));
    let command_consumer = Arc::new(CommandConsumer::new(
        store.clone() as Arc<dyn fistfight_store::CommandIdempotency>,
        bus.clone() as Arc<dyn fistfight_service::EventBus>,
        lifecycle_service,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let deadline_worker = DeadlineWorker::new(
        store.clone() as Arc<dyn fistfight_store::StateStore>,
        clock as Arc<dyn fistfight_engine::Clock>,
        turn_service.clone(),
        DeadlineWorkerConfig { lease_ttl_ms: config.lease_ttl_ms, ..DeadlineWorkerConfig::default() },
    );
    let deadline_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move { deadline_worker.run(shutdown_rx).await }
    });

    let consumer_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        let consumer_name = format!("server-{}", std::process::id());
        async move { redis_bus::run_command_consumer_loop(consumer_conn, consumer_name, command_consumer, shutdown_rx).await }
    });

    let gateway_state = Arc::new(GatewayState {
        store: store as Arc<dyn fistfight_store::StateStore>,
        turn_service,
        notifier,
    });

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(move || { let handle = prometheus_handle.clone(); async move { handle.render() } }))
        .route("/ws", get(ws_handler))
        .with_state(gateway_state)
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind to {addr}: {e}");
        std::process::exit(1);
    });
    info!(%addr, "fistfight-server listening");

    let serve = axum::serve(listener, app);
    tokio::select! {
        result = serve => {
            if let Err(err) = result {
                tracing::error!(error = %err, "http server exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down background workers");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = deadline_handle.await;
    let _ = consumer_handle.await;
}
