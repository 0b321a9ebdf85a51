use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_api::config::Config;
use chat_api::db::kv::{KeyValueStore, MemoryStore, RedisStore};
use chat_api::db::pool;
use chat_api::feed::{FeedBridge, RedisStreamSource, FEED_RESTART_DELAY};
use chat_api::gateway::ConnectionRegistry;
use chat_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => {
            let conn = pool::connect(url).await.expect("failed to connect to redis");
            Arc::new(RedisStore::new(conn))
        }
        None => {
            tracing::warn!("REDIS_URL not set; sessions are kept in memory and the feed is disabled");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        session_ttl_secs = config.session_ttl_secs,
        message_window = config.message_window,
        "chat-api configured"
    );

    let state = AppState::new(config, kv);
    let (feed_stop_tx, feed_stop_rx) = watch::channel(false);

    // The feed reads with blocking XREADGROUP calls, so it gets its own
    // connection instead of sharing the store's.
    let feed_task = state.config.redis_url.clone().map(|url| {
        let bridge = FeedBridge::new(state.connections.clone());
        let config = state.config.clone();
        tokio::spawn(async move {
            let poll = Duration::from_millis(config.feed_poll_ms);
            let connect = || {
                let url = url.clone();
                let config = config.clone();
                async move {
                    let conn = pool::connect(&url).await?;
                    RedisStreamSource::subscribe(
                        conn,
                        &config.feed_stream,
                        &config.feed_group,
                        &config.feed_consumer,
                        poll,
                    )
                    .await
                }
            };
            bridge
                .supervise(connect, feed_stop_rx, FEED_RESTART_DELAY)
                .await;
        })
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.connections.clone(), feed_stop_tx))
        .await
        .expect("server error");

    if let Some(task) = feed_task {
        let _ = task.await;
    }
    tracing::info!("chat-api stopped");
}

/// Resolve on Ctrl-C after stopping the feed and closing every live
/// connection, so each socket task sees the close and exits.
async fn shutdown_signal(connections: Arc<ConnectionRegistry>, feed_stop: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutdown signal received");
    let _ = feed_stop.send(true);
    connections.close_all().await;
}
