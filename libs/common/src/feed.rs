use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A bot-produced message published to the feed topic, e.g. a stock quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeedMessage {
    pub room_id: String,
    pub bot_message: String,
    pub created_at: DateTime<Utc>,
}

impl FeedMessage {
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
