pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod routes;
pub mod session;

use std::sync::Arc;

use config::Config;
use db::kv::KeyValueStore;
use gateway::ConnectionRegistry;
use session::{EventLogStore, SessionService};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionService>,
    pub connections: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Wire the session coordinator over `kv` and an empty connection table.
    pub fn new(config: Config, kv: Arc<dyn KeyValueStore>) -> Self {
        let store = EventLogStore::new(kv, config.session_ttl_secs);
        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionService::new(store)),
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }
}
