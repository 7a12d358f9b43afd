//! The `transport` module owns the WebSocket connection to the Topica
//! broker.
//!
//! `connection` runs the connect, read and reconnect loop and reports the
//! lifecycle through [`ConnectionHandler`]. `link` is the gate every outbound
//! frame goes through: it only accepts writes while the connection is open.

pub mod connection;
pub mod link;

pub use connection::{ConnectionHandler, ReconnectPolicy, run_connection};
pub use link::{ConnectionState, Link};
