//! Room activity log entries and their chat-message projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::session::SessionUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RoomAction,
    Message,
}

/// Content carried by a `room_action` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    UserJoin,
    UserExit,
}

impl RoomAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomAction::UserJoin => "user_join",
            RoomAction::UserExit => "user_exit",
        }
    }
}

/// An immutable entry in a room's activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    #[serde(flatten)]
    pub user: SessionUser,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl Event {
    pub fn room_action(user: SessionUser, action: RoomAction, created_at: DateTime<Utc>) -> Self {
        Self {
            user,
            kind: EventType::RoomAction,
            created_at,
            content: action.as_str().to_string(),
        }
    }

    pub fn is_message(&self) -> bool {
        self.kind == EventType::Message
    }

    /// Project a `message` event back into a [`ChatMessage`]. Room actions
    /// have no projection.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        self.is_message().then(|| ChatMessage {
            user: self.user.clone(),
            created_at: self.created_at,
            content: self.content.clone(),
        })
    }
}

impl From<ChatMessage> for Event {
    fn from(message: ChatMessage) -> Self {
        Self {
            user: message.user,
            kind: EventType::Message,
            created_at: message.created_at,
            content: message.content,
        }
    }
}

/// A chat message as sent by clients and returned by history queries.
///
/// Frames without `created_at` are stamped with the time they were decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    #[serde(flatten)]
    pub user: SessionUser,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl ChatMessage {
    pub fn new(user: SessionUser, content: impl Into<String>) -> Self {
        Self {
            user,
            created_at: Utc::now(),
            content: content.into(),
        }
    }
}
