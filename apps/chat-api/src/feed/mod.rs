//! Bot feed consumption: pulls `{room_id, bot_message, created_at}` payloads
//! from the message bus and relays them to the room's live connections.

pub mod bridge;
pub mod source;

pub use bridge::{FeedBridge, FEED_RESTART_DELAY};
pub use source::{ChannelSource, FeedError, FeedSource, RedisStreamSource};
