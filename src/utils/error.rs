//! The `error` module defines the error types shared across `topica`.
//!
//! `TopicaError` is what the public API hands back, either as a `Result` or
//! through the `error` event. Codec errors live next to the codec in
//! `crate::codec::CodecError` and are wrapped here.

use crate::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum TopicaError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tungstenite::Error>),
    #[error("websocket transport failed: {0}")]
    Transport(Box<tungstenite::Error>),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("topic discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("connection is not open")]
    NotOpen,
    #[error("connection closed before `{0}` resolved")]
    ConnectionClosed(String),
    #[error("no response for `{path}` within {timeout_ms} ms")]
    GetTimeout { path: String, timeout_ms: u64 },
    #[error("get on `{0}` was superseded by a newer request")]
    Superseded(String),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Failures of the two-step topic discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("could not resolve the REST port: {0}")]
    PortUnresolved(Box<TopicaError>),
    #[error("REST port topic carried an unusable value `{0}`")]
    InvalidPort(String),
    #[error("topic listing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("topic listing returned HTTP {0}")]
    Status(u16),
}
