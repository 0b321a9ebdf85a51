use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = chatroom_common::id::prefixed_ulid("conn");
/// assert!(id.starts_with("conn_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// A live WebSocket connection held by the registry.
    pub const CONNECTION: &str = "conn";
    /// A feed consumer inside the shared consumer group.
    pub const FEED_CONSUMER: &str = "feed";
}
