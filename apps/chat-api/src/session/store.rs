use std::sync::Arc;

use crate::db::kv::{KeyValueStore, StoreError};

use super::model::Session;

/// Default inactivity window for a room's session.
pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// TTL-bound storage of one [`Session`] per room.
///
/// Every write re-arms the expiry, so an idle room disappears one TTL after
/// its last activity.
pub struct EventLogStore {
    kv: Arc<dyn KeyValueStore>,
    ttl_secs: u64,
}

impl EventLogStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, ttl_secs: u64) -> Self {
        Self { kv, ttl_secs }
    }

    fn key(room_id: &str) -> String {
        format!("chat:session:{room_id}")
    }

    /// Load the room's session. A missing or expired key yields an empty
    /// session rather than an error.
    pub async fn get(&self, room_id: &str) -> Result<Session, StoreError> {
        let Some(raw) = self.kv.get(&Self::key(room_id)).await? else {
            return Ok(Session::default());
        };
        serde_json::from_str(&raw).map_err(|err| {
            tracing::error!(?err, room_id, "stored session is corrupt");
            StoreError::from(err)
        })
    }

    pub async fn set(&self, room_id: &str, session: &Session) -> Result<(), StoreError> {
        let value = serde_json::to_string(session)?;
        self.kv
            .set_ex(&Self::key(room_id), &value, self.ttl_secs)
            .await
    }
}
