//! In-process [`Connection`] used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use chatroom_common::id::{prefix, prefixed_ulid};

use super::connection::{Connection, ConnectionError};

/// Records every payload written to it. A broken connection fails every
/// write but still counts the attempt.
pub struct RecordingConnection {
    id: String,
    sent: Mutex<Vec<Vec<u8>>>,
    attempts: AtomicUsize,
    broken: bool,
    closed: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self {
            id: prefixed_ulid(prefix::CONNECTION),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            broken: false,
            closed: AtomicBool::new(false),
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.broken || self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.sent.lock().push(payload.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
