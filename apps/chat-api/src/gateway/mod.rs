//! Live client connections: the registry of open sockets, the WebSocket
//! endpoint that feeds it, and room-wide fan-out.

pub mod connection;
pub mod registry;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::{Connection, ConnectionError, WsConnection};
pub use registry::{Acquired, ConnectionRegistry, RegistryError};
