pub mod health;
pub mod session;

use axum::Router;
use utoipa::OpenApi;

use crate::gateway;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(session::router())
        .merge(gateway::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Session
        session::join,
        session::exit,
        session::get_messages,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Wire types
            chatroom_common::ChatMessage,
            chatroom_common::SessionUser,
            chatroom_common::SessionAction,
            chatroom_common::ActionKind,
            chatroom_common::FeedMessage,
            // Route request/response types
            health::HealthResponse,
            session::SessionRequest,
            session::JoinResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Session", description = "Room membership and message history"),
    )
)]
pub struct ApiDoc;
