//! Room membership and history endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use chatroom_common::{ChatMessage, SessionAction, SessionUser};

use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::RegistryError;
use crate::AppState;

/// Upper bound accepted for `?limit=` on message history.
pub const MAX_MESSAGE_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session/join", post(join))
        .route("/session/exit", post(exit))
        .route("/session/messages/", get(missing_room_id))
        .route("/session/messages/{room_id}", get(get_messages))
}

// ---------------------------------------------------------------------------
// Shared request body
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionRequest {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub user_id: String,
}

impl SessionRequest {
    fn validate(self) -> Result<(String, SessionUser), ApiError> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("room_id", &self.room_id),
            ("username", &self.username),
            ("user_id", &self.user_id),
        ] {
            if value.trim().is_empty() {
                errors.push(FieldError {
                    field: field.to_string(),
                    message: format!("{field} is required"),
                });
            }
        }
        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }

        Ok((self.room_id, SessionUser::new(self.username, self.user_id)))
    }
}

fn body_or_bad_request<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Push a membership notice to the room. Delivery failures are logged only.
async fn announce(state: &AppState, room_id: &str, action: &SessionAction) {
    if let Err(err) = state.connections.broadcast(room_id, &action.to_bytes()).await {
        tracing::warn!(?err, room_id, kind = ?action.kind, "membership notice not delivered");
    }
}

// ---------------------------------------------------------------------------
// POST /session/join
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinResponse {
    pub users: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/session/join",
    tag = "Session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Current members of the room", body = JoinResponse),
        (status = 400, description = "Malformed or incomplete body", body = ApiErrorBody),
        (status = 500, description = "Session store unavailable", body = ApiErrorBody),
    ),
)]
pub async fn join(
    State(state): State<AppState>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, ApiError> {
    let (room_id, user) = body_or_bad_request(body)?.validate()?;

    let users = state.sessions.join(&room_id, &user).await?;
    announce(&state, &room_id, &SessionAction::join(user)).await;

    Ok(Json(JoinResponse { users }))
}

// ---------------------------------------------------------------------------
// POST /session/exit
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/session/exit",
    tag = "Session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Connection closed and exit recorded"),
        (status = 400, description = "No live connection, or not a member", body = ApiErrorBody),
        (status = 500, description = "Session store unavailable", body = ApiErrorBody),
    ),
)]
pub async fn exit(
    State(state): State<AppState>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let (room_id, user) = body_or_bad_request(body)?.validate()?;

    match state.connections.release(&room_id, &user.user_id).await {
        Ok(()) => {}
        Err(err @ RegistryError::NoConnection { .. }) => return Err(err.into()),
        Err(err) => {
            tracing::warn!(?err, %room_id, user_id = %user.user_id, "closing connection failed; exiting anyway");
        }
    }

    state.sessions.exit(&room_id, &user).await?;
    announce(&state, &room_id, &SessionAction::exit(user)).await;

    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// GET /session/messages/{room_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MessagesParams {
    /// Number of trailing events to scan, clamped to 1-100. Defaults to the
    /// configured message window.
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/session/messages/{room_id}",
    tag = "Session",
    params(
        ("room_id" = String, Path, description = "Room id"),
        MessagesParams,
    ),
    responses(
        (status = 200, description = "Chat messages, oldest first", body = Vec<ChatMessage>),
        (status = 400, description = "Missing room id or bad query", body = ApiErrorBody),
        (status = 500, description = "Session store unavailable", body = ApiErrorBody),
    ),
)]
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    params: Result<Query<MessagesParams>, QueryRejection>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    if room_id.trim().is_empty() {
        return Err(ApiError::bad_request("room_id is required"));
    }

    let limit = params
        .limit
        .map_or(state.config.message_window, |limit| limit.clamp(1, MAX_MESSAGE_LIMIT));
    let messages = state.sessions.get_messages(&room_id, limit).await?;

    Ok(Json(messages))
}

async fn missing_room_id() -> ApiError {
    ApiError::bad_request("room_id is required")
}
