use redis::aio::ConnectionManager;

/// Open a Redis connection manager. The manager reconnects on its own after
/// transient failures, so callers clone it rather than reconnecting.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("redis connection manager created");

    Ok(manager)
}
