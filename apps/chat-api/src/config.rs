use chatroom_common::id::{prefix, prefixed_ulid};

use crate::session::service::DEFAULT_MESSAGE_WINDOW;
use crate::session::store::SESSION_TTL_SECS;

/// Chat API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Redis connection string. When unset, sessions live in process memory
    /// and the feed bridge is disabled.
    pub redis_url: Option<String>,
    /// Inactivity window after which a room's session expires. Always at
    /// least one second; Redis rejects a zero expiry.
    pub session_ttl_secs: u64,
    /// Stream (topic) the bot feed is published to.
    pub feed_stream: String,
    /// Consumer group shared by every chat-api process reading the feed.
    pub feed_group: String,
    /// This process's consumer name inside `feed_group`. Fixed for the life
    /// of the process so feed restarts resume the same pending entries.
    pub feed_consumer: String,
    /// Upper bound on a single feed poll, in milliseconds.
    pub feed_poll_ms: u64,
    /// Default number of trailing events scanned by message history queries.
    pub message_window: usize,
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// local development defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any variable source. Unparseable or
    /// out-of-range values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |name: &str| lookup(name).and_then(|v| v.parse::<u64>().ok());
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            port: lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(8000),
            redis_url: non_empty("REDIS_URL"),
            session_ttl_secs: parsed("SESSION_TTL_SECS")
                .filter(|ttl| *ttl > 0)
                .unwrap_or(SESSION_TTL_SECS),
            feed_stream: non_empty("FEED_STREAM").unwrap_or_else(|| "stocks".to_string()),
            feed_group: non_empty("FEED_GROUP").unwrap_or_else(|| "chatroom-group".to_string()),
            feed_consumer: non_empty("FEED_CONSUMER")
                .unwrap_or_else(|| prefixed_ulid(prefix::FEED_CONSUMER)),
            feed_poll_ms: parsed("FEED_POLL_MS").filter(|ms| *ms > 0).unwrap_or(100),
            message_window: parsed("MESSAGE_WINDOW")
                .filter(|window| *window > 0)
                .map_or(DEFAULT_MESSAGE_WINDOW, |window| window as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]);
        assert_eq!(config.port, 8000);
        assert!(config.redis_url.is_none());
        assert_eq!(config.session_ttl_secs, SESSION_TTL_SECS);
        assert_eq!(config.feed_stream, "stocks");
        assert_eq!(config.feed_group, "chatroom-group");
        assert!(config.feed_consumer.starts_with("feed_"));
        assert_eq!(config.feed_poll_ms, 100);
        assert_eq!(config.message_window, DEFAULT_MESSAGE_WINDOW);
    }

    #[test]
    fn zero_session_ttl_falls_back_to_default() {
        assert_eq!(config(&[("SESSION_TTL_SECS", "0")]).session_ttl_secs, SESSION_TTL_SECS);
        assert_eq!(config(&[("SESSION_TTL_SECS", "-5")]).session_ttl_secs, SESSION_TTL_SECS);
        assert_eq!(config(&[("SESSION_TTL_SECS", "90")]).session_ttl_secs, 90);
    }

    #[test]
    fn message_window_is_taken_as_configured() {
        assert_eq!(config(&[("MESSAGE_WINDOW", "200")]).message_window, 200);
        assert_eq!(
            config(&[("MESSAGE_WINDOW", "0")]).message_window,
            DEFAULT_MESSAGE_WINDOW
        );
    }

    #[test]
    fn feed_consumer_is_configurable() {
        assert_eq!(
            config(&[("FEED_CONSUMER", "chat-api-1")]).feed_consumer,
            "chat-api-1"
        );
    }

    #[test]
    fn blank_redis_url_means_in_memory() {
        assert!(config(&[("REDIS_URL", " ")]).redis_url.is_none());
        assert_eq!(
            config(&[("REDIS_URL", "redis://127.0.0.1:6379")]).redis_url.as_deref(),
            Some("redis://127.0.0.1:6379")
        );
    }
}
