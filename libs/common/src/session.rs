use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identity of a room participant.
///
/// Treated as an opaque pair; uniqueness is whatever the caller guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub username: String,
    pub user_id: String,
}

impl SessionUser {
    pub fn new(username: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Join,
    Exit,
}

/// Membership notice pushed to every connection in a room:
/// `{"username", "user_id", "type": "join" | "exit"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionAction {
    #[serde(flatten)]
    pub user: SessionUser,
    #[serde(rename = "type")]
    pub kind: ActionKind,
}

impl SessionAction {
    pub fn join(user: SessionUser) -> Self {
        Self {
            user,
            kind: ActionKind::Join,
        }
    }

    pub fn exit(user: SessionUser) -> Self {
        Self {
            user,
            kind: ActionKind::Exit,
        }
    }

    /// Encode as the JSON frame sent over the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}
