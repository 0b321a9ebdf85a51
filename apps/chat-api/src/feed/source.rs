use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::mpsc;

/// Largest batch pulled from the stream in one read.
const READ_BATCH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(#[from] redis::RedisError),
    #[error("feed source closed")]
    Closed,
}

/// A bounded-wait receiver of raw feed payloads.
#[async_trait]
pub trait FeedSource: Send {
    /// Wait up to the source's poll interval for the next payload.
    /// `Ok(None)` means nothing arrived in time.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, FeedError>;
}

/// Which entries the next group read asks for.
///
/// A consumer first re-reads its own pending entries (id `0`), left behind if
/// an earlier run read them but never acknowledged. Once that backlog reads
/// back empty it moves on to new entries (id `>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadCursor {
    backlog: bool,
}

impl ReadCursor {
    fn new() -> Self {
        Self { backlog: true }
    }

    fn id(&self) -> &'static str {
        if self.backlog {
            "0"
        } else {
            ">"
        }
    }

    fn advance(&mut self, entries: usize) {
        if self.backlog && entries == 0 {
            self.backlog = false;
        }
    }
}

/// Reads a Redis Stream as a member of a consumer group.
///
/// Entries are acknowledged as soon as they are read, so a payload that later
/// fails to decode or broadcast is not redelivered.
pub struct RedisStreamSource {
    conn: ConnectionManager,
    stream: String,
    group: String,
    consumer: String,
    cursor: ReadCursor,
    block_ms: usize,
    pending: VecDeque<Vec<u8>>,
}

impl RedisStreamSource {
    /// Join `group` on `stream` as `consumer`, creating the stream and group
    /// if they do not exist yet.
    ///
    /// `consumer` should stay the same across restarts of the feed so that
    /// entries it read but never acknowledged are picked up again.
    /// `conn` should be dedicated to the feed: blocking reads hold the
    /// connection for up to `poll`.
    pub async fn subscribe(
        mut conn: ConnectionManager,
        stream: &str,
        group: &str,
        consumer: &str,
        poll: Duration,
    ) -> Result<Self, FeedError> {
        let created: Result<(), redis::RedisError> =
            conn.xgroup_create_mkstream(stream, group, "$").await;
        match created {
            Ok(()) => tracing::info!(stream, group, "created feed consumer group"),
            Err(err) if err.code() == Some("BUSYGROUP") => {}
            Err(err) => return Err(err.into()),
        }

        tracing::info!(stream, group, consumer, "subscribed to feed");

        Ok(Self {
            conn,
            stream: stream.to_string(),
            group: group.to_string(),
            consumer: consumer.to_string(),
            cursor: ReadCursor::new(),
            block_ms: poll.as_millis().max(1) as usize,
            pending: VecDeque::new(),
        })
    }
}

#[async_trait]
impl FeedSource for RedisStreamSource {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, FeedError> {
        if let Some(payload) = self.pending.pop_front() {
            return Ok(Some(payload));
        }

        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .block(self.block_ms)
            .count(READ_BATCH);
        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.stream], &[self.cursor.id()], &options)
            .await?;
        let entries: Vec<_> = reply
            .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default();
        self.cursor.advance(entries.len());
        if self.cursor.backlog && !entries.is_empty() {
            tracing::info!(count = entries.len(), consumer = %self.consumer, "redelivering unacknowledged feed entries");
        }

        let mut ids = Vec::new();
        for entry in entries {
            match entry.get::<Vec<u8>>("payload") {
                Some(payload) => self.pending.push_back(payload),
                None => tracing::warn!(id = %entry.id, "feed entry has no payload field"),
            }
            ids.push(entry.id);
        }

        if !ids.is_empty() {
            let _: () = self.conn.xack(&self.stream, &self.group, &ids[..]).await?;
        }

        Ok(self.pending.pop_front())
    }
}

/// In-process feed backed by a tokio channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
    poll: Duration,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>, poll: Duration) -> Self {
        Self { rx, poll }
    }

    /// A connected sender/source pair.
    pub fn channel(capacity: usize, poll: Duration) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, poll))
    }
}

#[async_trait]
impl FeedSource for ChannelSource {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, FeedError> {
        match tokio::time::timeout(self.poll, self.rx.recv()).await {
            Ok(Some(payload)) => Ok(Some(payload)),
            Ok(None) => Err(FeedError::Closed),
            Err(_) => Ok(None),
        }
    }
}
