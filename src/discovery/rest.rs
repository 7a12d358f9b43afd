use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;

use super::TOPICS_ENDPOINT;
use crate::codec::Value;
use crate::utils::error::DiscoveryError;

/// Reads a REST port out of the value published on the port meta-topic.
///
/// Brokers publish it as an integer, but a numeric string is accepted too.
pub fn rest_port(value: &Value) -> Result<u16, DiscoveryError> {
    let port = match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        other => other.as_i64(),
    };

    port.and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| DiscoveryError::InvalidPort(value.to_string()))
}

pub fn topics_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}{TOPICS_ENDPOINT}")
}

/// Fetches the topic list from the REST companion.
pub async fn fetch_topics(
    http: &reqwest::Client,
    host: &str,
    port: u16,
) -> Result<Vec<String>, DiscoveryError> {
    let url = topics_url(host, port);
    debug!(%url, "fetching topic list");

    let response = http
        .get(&url)
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .send()
        .await?;

    if response.status() != StatusCode::OK {
        return Err(DiscoveryError::Status(response.status().as_u16()));
    }

    Ok(response.json::<Vec<String>>().await?)
}
