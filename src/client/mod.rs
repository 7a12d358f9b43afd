//! The `client` module is the public face of `topica`.
//!
//! [`TopicaClient`] ties the transport, router and discovery together and
//! exposes get, set, subscribe, topic discovery and lifecycle events.

pub mod events;
pub mod topica_client;

pub use events::{Event, EventCallback, EventKind};
pub use topica_client::TopicaClient;
