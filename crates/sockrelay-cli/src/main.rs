#![deny(unsafe_code)]

//! SockRelay CLI — discover instance sockets and send requests through them.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use sockrelay_config::AppConfig;
use sockrelay_core::Client;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// SockRelay — round-robin client for local instances behind Unix sockets.
#[derive(Parser)]
#[command(name = "sockrelay", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "sockrelay.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding one subdirectory per instance (overrides config).
    #[arg(long, global = true)]
    sockets_root: Option<PathBuf>,

    /// Socket file name inside each instance directory (overrides config).
    #[arg(long, global = true)]
    socket_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the sockets root and list the instance sockets found.
    Discover,

    /// Send one request through the first instance that answers.
    Request {
        /// Destination URL the instance should forward to.
        url: String,

        /// JSON payload (defaults to `{}`).
        #[arg(long, conflicts_with = "data_file")]
        data: Option<String>,

        /// Read the JSON payload from a file.
        #[arg(long)]
        data_file: Option<PathBuf>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, from_file) = load_config(&cli.config).await?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    init_tracing(cli.verbose, &config.logging.level);
    if !from_file {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Discover => cmd_discover(&config).await?,
        Commands::Request {
            url,
            data,
            data_file,
        } => cmd_request(&config, &url, data.as_deref(), data_file.as_deref()).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8, configured: &str) {
    let filter = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_discover(config: &AppConfig) -> Result<()> {
    let client = Client::from_config(config);
    let added = client.refresh().await?;
    debug!(added, "discovery complete");

    for socket in client.sockets() {
        println!("{}", socket.display());
    }
    Ok(())
}

async fn cmd_request(
    config: &AppConfig,
    url: &str,
    data: Option<&str>,
    data_file: Option<&Path>,
) -> Result<()> {
    let payload = match data_file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read payload from {}", path.display()))?;
            parse_payload(Some(&text))?
        }
        None => parse_payload(data)?,
    };

    let client = Client::from_config(config);
    client.refresh().await?;
    info!(url, instances = client.sockets().len(), "sending request");

    let body = client.execute_authorized_request(url, &payload).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
///
/// The flag reports whether the file was found.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(root) = &cli.sockets_root {
        config.discovery.sockets_root = root.clone();
    }
    if let Some(name) = &cli.socket_name {
        config.discovery.socket_name = name.clone();
    }
}

fn parse_payload(data: Option<&str>) -> Result<Value> {
    match data {
        Some(text) => serde_json::from_str(text).context("payload is not valid JSON"),
        None => Ok(Value::Object(serde_json::Map::new())),
    }
}
