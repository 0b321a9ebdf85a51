use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use chat_api::config::Config;
use chat_api::db::kv::{KeyValueStore, MemoryStore};
use chat_api::AppState;

/// Build a test AppState over an in-memory store, with `configure` applied
/// on top of the defaults.
pub fn test_state_with(configure: impl FnOnce(&mut Config)) -> AppState {
    let mut config = Config::from_lookup(|_| None);
    configure(&mut config);

    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    AppState::new(config, kv)
}

pub fn test_state() -> AppState {
    test_state_with(|_| {})
}

/// Build the full application router wired to the given state.
pub fn app_for(state: &AppState) -> Router {
    chat_api::routes::router().with_state(state.clone())
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    (app_for(&state), state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background for the rest of the test.
pub async fn start_server() -> (SocketAddr, AppState) {
    let (app, state) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// A room id no other test uses.
pub fn unique_room() -> String {
    chatroom_common::id::prefixed_ulid("room")
}

/// Join/exit request body for `username`, whose user id is `id-{username}`.
pub fn member_body(room_id: &str, username: &str) -> serde_json::Value {
    serde_json::json!({
        "room_id": room_id,
        "username": username,
        "user_id": format!("id-{username}"),
    })
}
