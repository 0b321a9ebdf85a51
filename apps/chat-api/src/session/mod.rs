//! Per-room session state: membership and the append-only activity log.

pub mod model;
pub mod service;
pub mod store;

pub use model::Session;
pub use service::{SessionError, SessionService};
pub use store::EventLogStore;
