//! thinkloop CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Run one task through the ReAct loop
//! - `tools`   — List the built-in tools
//! - `status`  — Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thinkloop_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "thinkloop",
    about = "thinkloop — a ReAct agent with bounded conversation memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.thinkloop/config.toml)
    #[arg(short, long, global = true, env = "THINKLOOP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task until the model answers
    Run {
        /// The user message
        #[arg(short, long)]
        message: String,

        /// Task id; reusing one resumes its stored summary
        #[arg(short, long)]
        task_id: Option<String>,
    },

    /// List the built-in tools
    Tools,

    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_overrides(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    // Initialize tracing
    let filter = if cli.verbose || config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { message, task_id } => commands::run::run(&config, message, task_id).await?,
        Commands::Tools => commands::tools::run()?,
        Commands::Status => commands::status::run(&config, cli.config.as_deref()),
    }

    Ok(())
}
