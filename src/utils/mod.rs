//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `topica` crate.
//!
//! - `error`: the crate error type and the discovery error.
//! - `logging`: tracing subscriber setup.

pub mod error;
pub mod logging;

pub use error::{DiscoveryError, TopicaError};
