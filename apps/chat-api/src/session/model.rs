use chatroom_common::{ChatMessage, Event};
use serde::{Deserialize, Serialize};

/// The persisted state of one room.
///
/// An empty `room_id` means the room has no live session (never joined, or
/// expired); [`Session::default`] is that empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub room_id: String,
    #[serde(default)]
    pub current_users: Vec<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Session {
    pub fn exists(&self) -> bool {
        !self.room_id.is_empty()
    }

    pub fn has_user(&self, username: &str) -> bool {
        self.current_users.iter().any(|u| u == username)
    }

    /// Remove `username` from the member list. Absent names are ignored.
    pub fn remove_user(&mut self, username: &str) {
        if let Some(pos) = self.current_users.iter().position(|u| u == username) {
            self.current_users.remove(pos);
        }
    }

    /// Chat messages among the trailing `limit` events, oldest first.
    ///
    /// The window is taken over all events before filtering, so room actions
    /// inside the window reduce the number of messages returned.
    pub fn message_window(&self, limit: usize) -> Vec<ChatMessage> {
        let start = self.events.len().saturating_sub(limit);
        self.events[start..]
            .iter()
            .filter_map(Event::to_chat_message)
            .collect()
    }
}
