//! The `discovery` module finds out which topics a broker knows about.
//!
//! Discovery takes two steps: the broker publishes the port of its REST
//! companion on a meta-topic, and that companion lists every topic as JSON.

pub mod rest;

pub use rest::{fetch_topics, rest_port, topics_url};

/// Meta-topic carrying the port of the REST companion.
pub const REST_PORT_TOPIC: &str = "/topica/rest_port";
/// Meta-topic whose value changes whenever the broker creates a topic.
pub const LAST_TOPIC_CREATED: &str = "/topica/last_topic_created";
/// Per-connection nickname assigned by the broker.
pub const ME_NICKNAME: &str = "/me/nickname";
/// Per-connection id assigned by the broker.
pub const ME_ID: &str = "/me/id";

pub const TOPICS_ENDPOINT: &str = "/api/v2/topics";
