//! CLI for Topica
//!
//! Subcommands:
//! - `get`: print the current value of a topic
//! - `set`: write a typed value to a topic
//! - `subscribe`: stream every update under a path prefix
//! - `topics`: list the topics the broker knows about
//! - `watch`: print the topic list whenever a topic is created
//! - `whoami`: print the nickname and id the broker gave this connection

use std::time::Duration;

use clap::{Parser, Subcommand};
use topica::client::{Event, EventKind, TopicaClient};
use topica::codec::{Value, ValueType};
use topica::config::{Settings, load_config};
use topica::discovery::{ME_ID, ME_NICKNAME};
use topica::utils::error::TopicaError;
use topica::utils::logging;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "topica", about = "Talk to a Topica broker")]
struct Cli {
    /// Broker host, overrides the configuration
    #[arg(long, global = true)]
    host: Option<String>,
    /// Broker WebSocket port, overrides the configuration
    #[arg(long, global = true)]
    port: Option<u16>,
    /// How long to wait for the connection before giving up
    #[arg(long, global = true, default_value_t = 5000)]
    open_timeout_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current value of a topic
    Get { path: String },
    /// Write a value to a topic
    Set {
        path: String,
        /// Wire type: byte, int16, int32, int64, float, double, string or bool
        #[arg(long = "type", short = 't')]
        ty: ValueType,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Stream updates under a path prefix until Ctrl-C
    Subscribe {
        prefix: String,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u32,
    },
    /// Print the topic list as JSON
    Topics,
    /// Print the topic list every time a topic is created
    Watch,
    /// Print the nickname and id of this connection
    Whoami,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration, using defaults: {e}");
            Settings::default()
        }
    };
    if let Some(host) = cli.host {
        settings.broker.host = host;
    }
    if let Some(port) = cli.port {
        settings.broker.port = port;
    }

    logging::init(&settings.log.level);

    let open_timeout = Duration::from_millis(cli.open_timeout_ms);
    if let Err(e) = run(cli.command, settings, open_timeout).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(
    command: Command,
    settings: Settings,
    open_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = TopicaClient::new(settings);
    client.connect();

    let result = match client.wait_until_open(open_timeout).await {
        Ok(()) => execute(&client, command).await,
        Err(e) => Err(format!("could not reach {}: {e}", client.url()).into()),
    };

    // flushes queued writes before the socket closes
    client.shutdown().await;
    result
}

async fn execute(client: &TopicaClient, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Get { path } => {
            let value = client.get_value(&path).await?;
            println!("{value} ({})", value.value_type());
        }
        Command::Set { path, ty, value } => {
            let value = Value::parse(ty, &value)?;
            client.set(&path, value)?;
            info!("Set {path}");
        }
        Command::Subscribe {
            prefix,
            interval_ms,
        } => {
            print_updates(client, &prefix, interval_ms)?;

            let resubscriber = client.clone();
            client.on_event(EventKind::Reconnect, move |_: &Event| {
                if let Err(e) = print_updates(&resubscriber, &prefix, interval_ms) {
                    warn!("Re-subscribing failed: {e}");
                }
            });

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received. Exiting gracefully.");
        }
        Command::Topics => {
            let topics = client.get_topics().await?;
            println!("{}", serde_json::to_string_pretty(&topics)?);
        }
        Command::Watch => {
            client.on_event(EventKind::NewTopic, |event: &Event| {
                if let Event::NewTopic { topics } = event {
                    match serde_json::to_string_pretty(topics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => warn!("Failed to render topic list: {e}"),
                    }
                }
            });
            client.on_event(EventKind::Error, |event: &Event| {
                if let Event::Error(e) = event {
                    warn!("{e}");
                }
            });

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received. Exiting gracefully.");
        }
        Command::Whoami => {
            let nickname = client.get_value(ME_NICKNAME).await?;
            let id = client.get_value(ME_ID).await?;
            println!("nickname: {nickname}");
            println!("id: {id}");
        }
    }
    Ok(())
}

fn print_updates(client: &TopicaClient, prefix: &str, interval_ms: u32) -> Result<(), TopicaError> {
    client.subscribe(prefix, interval_ms, |path: &str, value: &Value| {
        println!("{path} = {value} ({})", value.value_type());
    })
}
