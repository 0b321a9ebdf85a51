//! Duplex connection handles held by the registry.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;

use chatroom_common::id::{prefix, prefixed_ulid};

type WsSink = SplitSink<WebSocket, Message>;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection already closed")]
    Closed,
    #[error("websocket transport error: {0}")]
    Transport(#[from] axum::Error),
}

/// Write side of a live client connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Unique id of this handle (`conn_` prefixed ULID).
    fn id(&self) -> &str;
    /// Write one frame carrying `payload`.
    async fn send(&self, payload: &[u8]) -> Result<(), ConnectionError>;
    /// Close the connection. Closing twice reports [`ConnectionError::Closed`].
    async fn close(&self) -> Result<(), ConnectionError>;
    /// Whether the connection is known to be closed, by either side.
    fn is_closed(&self) -> bool;
}

/// A [`Connection`] over the write half of an axum WebSocket.
///
/// The handle is registered before the handshake completes and the socket
/// is attached afterwards. Frames sent while no socket is attached are
/// dropped.
pub struct WsConnection {
    id: String,
    sink: Mutex<Option<WsSink>>,
    closed: AtomicBool,
}

impl WsConnection {
    /// A handle with no socket attached yet.
    pub fn pending() -> Self {
        Self {
            id: prefixed_ulid(prefix::CONNECTION),
            sink: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Attach the socket once the upgrade has completed. Returns `false` if
    /// the handle was closed in the meantime; the socket then receives a
    /// close frame straight away.
    pub async fn attach(&self, sink: WsSink) -> bool {
        let mut slot = self.sink.lock().await;
        *slot = Some(sink);
        if !self.is_closed() {
            return true;
        }
        if let Some(sink) = slot.as_mut() {
            let _ = sink.send(close_message(close_code::NORMAL, "session closed")).await;
        }
        false
    }

    /// Record that the peer went away without going through [`close`].
    ///
    /// [`close`]: Connection::close
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Send a close frame with an application reason.
    pub async fn close_with(&self, code: u16, reason: &str) -> Result<(), ConnectionError> {
        // Taken before the flag flips so a concurrent `attach` sends at most
        // one close frame between them.
        let mut slot = self.sink.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ConnectionError::Closed);
        }
        if let Some(sink) = slot.as_mut() {
            sink.send(close_message(code, reason)).await?;
        }
        Ok(())
    }
}

fn close_message(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }))
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        let mut slot = self.sink.lock().await;
        let Some(sink) = slot.as_mut() else {
            tracing::debug!(connection_id = %self.id, "dropping frame for connection still upgrading");
            return Ok(());
        };
        // Chat traffic is JSON, so frames go out as text unless the payload
        // is not valid UTF-8.
        let message = match std::str::from_utf8(payload) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(Bytes::copy_from_slice(payload)),
        };
        sink.send(message).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.close_with(close_code::NORMAL, "session closed").await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_handle_drops_frames_until_attached() {
        let conn = WsConnection::pending();
        assert!(conn.id().starts_with("conn_"));
        assert!(conn.send(b"early").await.is_ok());
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn pending_handle_can_be_closed_once() {
        let conn = WsConnection::pending();
        conn.close().await.unwrap();

        assert!(conn.is_closed());
        assert!(matches!(conn.close().await, Err(ConnectionError::Closed)));
        assert!(matches!(conn.send(b"late").await, Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn mark_closed_rejects_further_writes() {
        let conn = WsConnection::pending();
        conn.mark_closed();

        assert!(conn.is_closed());
        assert!(matches!(conn.send(b"late").await, Err(ConnectionError::Closed)));
    }
}
