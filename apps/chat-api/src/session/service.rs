//! Membership transitions and message log operations for a room.
//!
//! Mutating operations on the same room are serialized through a per-room
//! lock so concurrent read-modify-write cycles against the store cannot drop
//! each other's updates. Reads take no lock.

use std::sync::Arc;

use chatroom_common::{ChatMessage, Event, RoomAction, SessionUser};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::kv::StoreError;

use super::model::Session;
use super::store::EventLogStore;

/// Number of trailing events scanned for chat history by default.
pub const DEFAULT_MESSAGE_WINDOW: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("user is not a member of room {room_id}")]
    NotAMember { room_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SessionService {
    store: EventLogStore,
    room_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds a room's lock; prunes the lock entry on drop once nobody else is
/// waiting on it.
struct RoomGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    room_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.room_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SessionService {
    pub fn new(store: EventLogStore) -> Self {
        Self {
            store,
            room_locks: DashMap::new(),
        }
    }

    async fn lock_room(&self, room_id: &str) -> RoomGuard<'_> {
        let lock = self
            .room_locks
            .entry(room_id.to_string())
            .or_default()
            .clone();
        RoomGuard {
            locks: &self.room_locks,
            room_id: room_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Add `user` to the room, creating the session on first join.
    ///
    /// Joining while already a member changes nothing and returns the current
    /// member list.
    pub async fn join(&self, room_id: &str, user: &SessionUser) -> Result<Vec<String>, SessionError> {
        let _room = self.lock_room(room_id).await;
        let mut session = self.store.get(room_id).await?;

        if session.has_user(&user.username) {
            tracing::warn!(room_id, username = %user.username, "user already in session");
            return Ok(session.current_users);
        }

        if !session.exists() {
            session.room_id = room_id.to_string();
        }
        session.current_users.push(user.username.clone());
        session
            .events
            .push(Event::room_action(user.clone(), RoomAction::UserJoin, Utc::now()));

        self.store.set(room_id, &session).await?;

        tracing::info!(room_id, username = %user.username, "user joined room");
        Ok(session.current_users)
    }

    pub async fn exit(&self, room_id: &str, user: &SessionUser) -> Result<(), SessionError> {
        let _room = self.lock_room(room_id).await;
        let mut session = self.live_session(room_id).await?;

        session.remove_user(&user.username);
        session
            .events
            .push(Event::room_action(user.clone(), RoomAction::UserExit, Utc::now()));

        self.store.set(room_id, &session).await?;

        tracing::info!(room_id, username = %user.username, "user exited room");
        Ok(())
    }

    pub async fn save_message(&self, room_id: &str, message: ChatMessage) -> Result<(), SessionError> {
        let _room = self.lock_room(room_id).await;
        let mut session = self.live_session(room_id).await?;

        session.events.push(message.into());

        self.store.set(room_id, &session).await?;
        Ok(())
    }

    /// Chat messages among the last `limit` events of the room, oldest first.
    pub async fn get_messages(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>, SessionError> {
        let session = self.store.get(room_id).await?;
        Ok(session.message_window(limit))
    }

    async fn live_session(&self, room_id: &str) -> Result<Session, SessionError> {
        let session = self.store.get(room_id).await?;
        if !session.exists() {
            tracing::warn!(room_id, "no live session for room");
            return Err(SessionError::NotAMember {
                room_id: room_id.to_string(),
            });
        }
        Ok(session)
    }
}
