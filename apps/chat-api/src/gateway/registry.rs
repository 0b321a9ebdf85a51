//! In-memory table of live connections keyed by room and user.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::connection::{Connection, ConnectionError};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no connection found for room {room_id}")]
    NoConnection { room_id: String },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Result of [`ConnectionRegistry::acquire`].
pub struct Acquired {
    pub connection: Arc<dyn Connection>,
    /// `false` when an existing entry for the key was returned.
    pub created: bool,
}

/// Per-room connections, ordered by user id so fan-out order is stable.
type RoomConnections = BTreeMap<String, Arc<dyn Connection>>;

/// Shared registry of every live connection in this process.
///
/// A single lock guards the whole table. Acquire, release and the full
/// broadcast fan-out all run under it, so one stalled write delays every
/// other registry call.
#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: Mutex<HashMap<String, RoomConnections>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the connection registered for `(room_id, user_id)`, running
    /// `upgrade` to create one if there is none. An entry whose connection is
    /// already closed counts as none and is replaced. A failed upgrade leaves
    /// the table untouched.
    pub async fn acquire<F, Fut>(
        &self,
        room_id: &str,
        user_id: &str,
        upgrade: F,
    ) -> Result<Acquired, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Connection>, ConnectionError>>,
    {
        let mut rooms = self.rooms.lock().await;

        if let Some(existing) = rooms.get(room_id).and_then(|room| room.get(user_id)) {
            if !existing.is_closed() {
                return Ok(Acquired {
                    connection: existing.clone(),
                    created: false,
                });
            }
            tracing::debug!(room_id, user_id, stale = existing.id(), "replacing closed connection");
        }

        let connection = upgrade().await?;
        rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string(), connection.clone());

        tracing::info!(room_id, user_id, connection_id = connection.id(), "connection registered");

        Ok(Acquired {
            connection,
            created: true,
        })
    }

    /// Close and remove the connection for `(room_id, user_id)`.
    ///
    /// The entry is removed even when the close itself fails; the close error
    /// is still returned.
    pub async fn release(&self, room_id: &str, user_id: &str) -> Result<(), RegistryError> {
        let mut rooms = self.rooms.lock().await;

        let connection = rooms
            .get_mut(room_id)
            .and_then(|room| room.remove(user_id))
            .ok_or_else(|| RegistryError::NoConnection {
                room_id: room_id.to_string(),
            })?;
        prune_room(&mut rooms, room_id);

        tracing::info!(room_id, user_id, connection_id = connection.id(), "connection released");

        connection.close().await?;
        Ok(())
    }

    /// Remove the entry for `(room_id, user_id)` without closing it, but only
    /// if it is still the connection identified by `connection_id`.
    pub async fn detach(&self, room_id: &str, user_id: &str, connection_id: &str) {
        let mut rooms = self.rooms.lock().await;

        let Some(room) = rooms.get_mut(room_id) else {
            return;
        };
        if room.get(user_id).is_some_and(|c| c.id() == connection_id) {
            room.remove(user_id);
            prune_room(&mut rooms, room_id);
            tracing::debug!(room_id, user_id, connection_id, "connection detached");
        }
    }

    /// Write `payload` to every connection in the room.
    ///
    /// An empty or unknown room is a successful no-op. The first failed write
    /// stops the fan-out and is returned; connections after it in the room
    /// receive nothing.
    pub async fn broadcast(&self, room_id: &str, payload: &[u8]) -> Result<(), RegistryError> {
        let rooms = self.rooms.lock().await;

        let Some(room) = rooms.get(room_id) else {
            return Ok(());
        };

        for (user_id, connection) in room {
            if let Err(err) = connection.send(payload).await {
                tracing::warn!(?err, room_id, user_id = %user_id, "broadcast write failed");
                return Err(err.into());
            }
        }

        tracing::debug!(room_id, recipients = room.len(), "broadcast delivered");
        Ok(())
    }

    /// Close and remove every connection. Used on shutdown.
    pub async fn close_all(&self) {
        let rooms = std::mem::take(&mut *self.rooms.lock().await);

        for (room_id, room) in rooms {
            for (user_id, connection) in room {
                if let Err(err) = connection.close().await {
                    tracing::debug!(?err, room_id = %room_id, user_id = %user_id, "close on shutdown failed");
                }
            }
        }
    }

    pub async fn connection_count(&self, room_id: &str) -> usize {
        self.rooms
            .lock()
            .await
            .get(room_id)
            .map_or(0, BTreeMap::len)
    }
}

fn prune_room(rooms: &mut HashMap<String, RoomConnections>, room_id: &str) {
    if rooms.get(room_id).is_some_and(BTreeMap::is_empty) {
        rooms.remove(room_id);
    }
}
