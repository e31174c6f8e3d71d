//! Toolpilot CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — Interactive chat or single-message mode (the default)
//! - `tools`  — List the tools the model can call

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toolpilot_config::AppConfig;
use tracing::debug;

mod commands;

#[derive(Parser)]
#[command(
    name = "toolpilot",
    about = "Toolpilot — a terminal assistant that can read files, write files and run commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.toolpilot/config.toml
    #[arg(short, long, global = true, env = "TOOLPILOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Override the configured cap on model round-trips per message
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// List the tools available to the assistant
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with answers on stdout
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    debug!(
        config_path = ?cli.config,
        model = %config.model_name,
        base_url = %config.base_url,
        "Configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Chat {
        message: None,
        max_iterations: None,
    }) {
        Commands::Chat {
            message,
            max_iterations,
        } => commands::chat::run(config, message, max_iterations).await?,
        Commands::Tools => commands::tools::run(&config)?,
    }

    Ok(())
}
