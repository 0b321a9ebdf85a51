//! WebSocket upgrade handler and per-connection read loop.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use serde::Deserialize;

use chatroom_common::ChatMessage;

use crate::error::{ApiError, FieldError};
use crate::AppState;

use super::connection::{Connection, WsConnection};

pub fn router() -> Router<AppState> {
    Router::new().route("/session/chat", get(ws_upgrade))
}

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    params: Result<Query<ChatParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let mut errors = Vec::new();
    if params.room_id.trim().is_empty() {
        errors.push(FieldError {
            field: "room_id".to_string(),
            message: "room_id is required".to_string(),
        });
    }
    if params.user_id.trim().is_empty() {
        errors.push(FieldError {
            field: "user_id".to_string(),
            message: "user_id is required".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    // The registry slot is claimed before the handshake, so a second socket
    // for a live key is refused without ever being upgraded.
    let pending = Arc::new(WsConnection::pending());
    let candidate: Arc<dyn Connection> = pending.clone();
    let acquired = state
        .connections
        .acquire(&params.room_id, &params.user_id, || async move { Ok(candidate) })
        .await?;
    if !acquired.created {
        tracing::info!(
            room_id = %params.room_id,
            user_id = %params.user_id,
            existing = acquired.connection.id(),
            "refusing second connection for user"
        );
        return Err(ApiError::conflict("user already has an open connection in this room"));
    }

    let failed = {
        let connections = state.connections.clone();
        let room_id = params.room_id.clone();
        let user_id = params.user_id.clone();
        let connection_id = pending.id().to_string();
        move |err: axum::Error| {
            tracing::warn!(?err, %room_id, %user_id, "websocket upgrade failed");
            tokio::spawn(async move {
                connections.detach(&room_id, &user_id, &connection_id).await;
            });
        }
    };

    Ok(ws
        .on_failed_upgrade(failed)
        .on_upgrade(move |socket| handle_connection(socket, state, params, pending)))
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    params: ChatParams,
    connection: Arc<WsConnection>,
) {
    let ChatParams {
        room_id,
        user_id,
        username,
    } = params;
    let (ws_tx, mut ws_rx) = socket.split();

    if !connection.attach(ws_tx).await {
        tracing::info!(%room_id, %user_id, connection_id = connection.id(), "connection closed before upgrade completed");
        state
            .connections
            .detach(&room_id, &user_id, connection.id())
            .await;
        return;
    }

    tracing::info!(%room_id, %user_id, %username, connection_id = connection.id(), "chat connection established");

    while let Some(frame) = ws_rx.next().await {
        let raw = match frame {
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!(?err, %room_id, %user_id, "ws read error");
                break;
            }
        };

        let message: ChatMessage = match serde_json::from_slice(&raw) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(?err, %room_id, %user_id, "dropping undecodable chat frame");
                continue;
            }
        };

        if let Err(err) = state.connections.broadcast(&room_id, &raw).await {
            tracing::error!(?err, %room_id, %user_id, "chat broadcast failed");
            continue;
        }

        if let Err(err) = state.sessions.save_message(&room_id, message).await {
            tracing::error!(?err, %room_id, %user_id, "failed to persist chat message; closing connection");
            if let Err(err) = state.connections.release(&room_id, &user_id).await {
                tracing::error!(?err, %room_id, %user_id, "failed to close connection");
            }
            return;
        }
    }

    // Flagged first so a reconnect racing the detach below replaces this
    // entry instead of being refused.
    connection.mark_closed();
    state
        .connections
        .detach(&room_id, &user_id, connection.id())
        .await;

    tracing::info!(%room_id, %user_id, connection_id = connection.id(), "chat connection ended");
}
