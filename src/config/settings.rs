use serde::Deserialize;

/// Top-level configuration settings for a Topica client.
///
/// Includes the broker address, client behaviour and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub client: ClientSettings,
    pub log: LogSettings,
}

/// Where the Topica broker listens.
///
/// The same host serves the companion REST endpoint used for discovery.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
}

impl BrokerSettings {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// Client-side behaviour: reconnection, get timeout and the
/// interval used for the internal new-topic subscription.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub reconnect: bool,
    pub reconnect_interval_ms: u64,
    /// `0` disables the timeout.
    pub get_timeout_ms: u64,
    pub newtopic_interval_ms: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub client: Option<PartialClientSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub reconnect: Option<bool>,
    pub reconnect_interval_ms: Option<u64>,
    pub get_timeout_ms: Option<u64>,
    pub newtopic_interval_ms: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// The broker port matches the robot backend's default Topica port.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                host: "localhost".to_string(),
                port: 5443,
            },
            client: ClientSettings {
                reconnect: true,
                reconnect_interval_ms: 5000,
                get_timeout_ms: 5000,
                newtopic_interval_ms: 1000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
