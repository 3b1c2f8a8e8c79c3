//! Replyline CLI: the main entry point.
//!
//! Commands:
//! - `serve`     : Start the review server
//! - `run`       : Run one customer message, reviewing it in the terminal
//! - `doctor`    : Check configuration and model access
//! - `scenarios` : List the built-in demo scenarios

use clap::{Args, Parser, Subcommand};
use replyline_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "replyline",
    about = "Replyline: moderated, human-reviewed customer service replies",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.toml (defaults to ~/.replyline/config.toml)
    #[arg(short, long, global = true, env = "REPLYLINE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the review server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind host
        #[arg(long)]
        host: Option<String>,
    },

    /// Run one customer message through the pipeline
    Run(RunArgs),

    /// Check configuration and model access
    Doctor {
        /// Skip the live model calls
        #[arg(long)]
        offline: bool,
    },

    /// List the built-in demo scenarios
    Scenarios,
}

#[derive(Args)]
pub struct RunArgs {
    /// Customer message (prompted for when neither this nor --scenario is given)
    #[arg(short, long, conflicts_with = "scenario")]
    message: Option<String>,

    /// Run a built-in scenario by index (see `replyline scenarios`)
    #[arg(short, long)]
    scenario: Option<usize>,

    #[arg(long)]
    customer_id: Option<String>,

    #[arg(long)]
    order_id: Option<String>,

    #[arg(long)]
    urgency: Option<String>,

    /// Approve the draft without prompting
    #[arg(long)]
    auto_approve: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logging needs the configured level, so load before validating.
    let loaded = AppConfig::load_unchecked(cli.config.as_deref());
    let level = loaded.as_ref().map_or("info", |c| c.log_level.as_str());
    let filter = if cli.verbose { "debug" } else { level };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = loaded.map_err(|e| format!("Failed to load config: {e}"))?;
    tracing::debug!(config = ?config, "Configuration loaded");

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(config, host, port).await?,
        Commands::Run(args) => commands::run::run(config, args).await?,
        Commands::Doctor { offline } => {
            let path = AppConfig::resolve_path(cli.config.as_deref());
            commands::doctor::run(config, &path, offline).await?
        },
        Commands::Scenarios => commands::scenarios::run(),
    }

    Ok(())
}
