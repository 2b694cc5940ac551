//! mqttelemetry command line entry point

use clap::{Parser, Subcommand};
use mqttelemetry::config::{ConfigError, TelemetryConfig};
use mqttelemetry::error::{TelemetryError, TelemetryResult};
use mqttelemetry::observability::init_default_logging;
use mqttelemetry::transport::mqtt::MessageService;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

/// Publish HTTP telemetry records over MQTT
#[derive(Parser)]
#[command(name = "mqttelemetry")]
#[command(about = "HTTP telemetry publisher for MQTT brokers")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, publish one message, wait for the acknowledgment, disconnect
    Publish {
        /// Topic to publish to; defaults to telemetry.topic
        #[arg(short, long)]
        topic: Option<String>,
        /// Message payload
        #[arg(short, long)]
        message: String,
    },
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["mqttelemetry.toml", "config/mqttelemetry.toml"];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Publish { topic, message } => publish_once(config, topic, message).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: Option<&Path>) -> Result<TelemetryConfig, ConfigError> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return TelemetryConfig::load_from_file(path);
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return TelemetryConfig::load_from_file(path);
        }
    }

    Err(ConfigError::InvalidConfig(format!(
        "No configuration file found. Provide one with -c/--config or create {}",
        DEFAULT_CONFIG_PATHS[0]
    )))
}

async fn publish_once(
    config: TelemetryConfig,
    topic: Option<String>,
    message: String,
) -> TelemetryResult<()> {
    let topic = topic.unwrap_or_else(|| config.telemetry.topic.clone());

    let mut service = MessageService::connect(config.mqtt)
        .await
        .map_err(TelemetryError::transport)?;

    let sent = service.send(&topic, &message).await;
    let closed = service.disconnect().await;

    let code = sent.map_err(TelemetryError::transport)?;
    closed.map_err(TelemetryError::transport)?;

    if code.is_success() {
        info!(topic = %topic, result = %code, "Message published");
        Ok(())
    } else {
        Err(TelemetryError::TransportError(
            format!("broker refused publish to {topic}: {code}").into(),
        ))
    }
}

fn handle_config_command(config: &TelemetryConfig, show: bool) -> TelemetryResult<()> {
    info!("Configuration is valid");

    if show {
        println!("{}", config.to_toml_string()?);
    }

    Ok(())
}
