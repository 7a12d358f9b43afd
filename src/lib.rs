//! # Topica
//!
//! `topica` is a client for Topica brokers: hierarchical topic stores that
//! speak a compact binary protocol over WebSockets. Clients read topics with
//! `get`, write them with `set`, and receive periodic pushes for every topic
//! under a subscribed path prefix.
//!
//! ## Core Modules
//!
//! - `client`: [`TopicaClient`], the public API, and its lifecycle events.
//! - `codec`: the binary frame format and the eight wire value types.
//! - `config`: layered configuration from files and `TOPICA_*` variables.
//! - `discovery`: topic listing through the broker's REST companion.
//! - `router`: correlation of inbound frames with gets and subscriptions.
//! - `transport`: the WebSocket connection and its reconnect loop.
//! - `utils`: error types and logging setup.

pub mod client;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod router;
pub mod transport;
pub mod utils;

pub use client::{Event, EventKind, TopicaClient};
pub use codec::{Value, ValueType};
pub use config::Settings;
pub use transport::ConnectionState;
pub use utils::error::TopicaError;

#[cfg(test)]
mod tests;
