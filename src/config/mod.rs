mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, ClientSettings, LogSettings, Settings};

/// Loads the configuration from the default file and environment variables
/// Environment variables use the `TOPICA_` prefix and `__` between sections,
/// e.g. `TOPICA_BROKER__PORT=5443`
/// Returns a `Settings` struct with every missing value taken from the defaults
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("TOPICA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let broker = partial.broker;
    let client = partial.client;
    let log = partial.log;

    Settings {
        broker: BrokerSettings {
            host: broker
                .as_ref()
                .and_then(|b| b.host.clone())
                .unwrap_or(default.broker.host),
            port: broker
                .as_ref()
                .and_then(|b| b.port)
                .unwrap_or(default.broker.port),
        },
        client: ClientSettings {
            reconnect: client
                .as_ref()
                .and_then(|c| c.reconnect)
                .unwrap_or(default.client.reconnect),
            reconnect_interval_ms: client
                .as_ref()
                .and_then(|c| c.reconnect_interval_ms)
                .unwrap_or(default.client.reconnect_interval_ms),
            get_timeout_ms: client
                .as_ref()
                .and_then(|c| c.get_timeout_ms)
                .unwrap_or(default.client.get_timeout_ms),
            newtopic_interval_ms: client
                .as_ref()
                .and_then(|c| c.newtopic_interval_ms)
                .unwrap_or(default.client.newtopic_interval_ms),
        },
        log: LogSettings {
            level: log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    }
}

#[cfg(test)]
mod tests;
