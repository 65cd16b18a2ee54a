//! Command socket: listener, per-connection protocol loop, wire types.

pub mod connection;
pub mod listener;
pub mod protocol;

pub use connection::ConnectionHandler;
pub use listener::{ServerContext, ShutdownHandle, SocketServer};
pub use protocol::{Request, Response};
