use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use chatroom_common::FeedMessage;

use crate::gateway::ConnectionRegistry;

use super::source::{FeedError, FeedSource};

/// Pause between a fatal feed error and the next subscription attempt.
pub const FEED_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Relays bot feed payloads to the connections of the room they name.
pub struct FeedBridge {
    connections: Arc<ConnectionRegistry>,
}

impl FeedBridge {
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self { connections }
    }

    /// Consume `source` until the stop signal fires (`Ok`) or the source
    /// fails (`Err`). Undecodable payloads and failed broadcasts are logged
    /// and skipped.
    pub async fn run<S>(
        &self,
        source: &mut S,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), FeedError>
    where
        S: FeedSource + ?Sized,
    {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let payload = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                    continue;
                }
                received = source.recv() => received?,
            };
            let Some(payload) = payload else {
                continue;
            };

            let message = match FeedMessage::from_slice(&payload) {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(?err, "dropping undecodable feed payload");
                    continue;
                }
            };

            if let Err(err) = self.connections.broadcast(&message.room_id, &payload).await {
                tracing::warn!(?err, room_id = %message.room_id, "feed broadcast failed");
            }
        }
    }

    /// Keep a bridge running until shutdown, resubscribing through `connect`
    /// after `restart_delay` whenever the feed fails.
    pub async fn supervise<F, Fut, S>(
        &self,
        mut connect: F,
        mut shutdown: watch::Receiver<bool>,
        restart_delay: Duration,
    ) where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, FeedError>>,
        S: FeedSource,
    {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = match connect().await {
                Ok(mut source) => self.run(&mut source, &mut shutdown).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => break,
                Err(err) => tracing::error!(?err, ?restart_delay, "feed bridge stopped; restarting"),
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(restart_delay) => {}
            }
        }

        tracing::info!("feed bridge shut down");
    }
}
