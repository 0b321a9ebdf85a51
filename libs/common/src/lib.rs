//! Wire types shared by the chat server and the feed producers that publish
//! into it.

pub mod event;
pub mod feed;
pub mod id;
pub mod session;

pub use event::{ChatMessage, Event, EventType, RoomAction};
pub use feed::FeedMessage;
pub use session::{ActionKind, SessionAction, SessionUser};
