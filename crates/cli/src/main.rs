//! Toolwright CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Execute one tool through the backend and print the result
//! - `tools`   — List the built-in tools
//! - `status`  — Probe the backend and show supervisor metrics
//! - `config`  — Print the effective configuration
//!
//! Logs go to stderr so stdout stays machine-readable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "toolwright",
    about = "Toolwright — repository tools answered by a local code model",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the conventional locations
    #[arg(short, long, global = true, env = "TOOLWRIGHT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a tool and print its result as JSON
    Run {
        /// Tool name (see `toolwright tools`)
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Extra context as a JSON object, merged into the assembled context
        #[arg(long)]
        context: Option<String>,
    },

    /// List available tools
    Tools {
        /// Print full metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show backend status
    Status,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            tool,
            args,
            context,
        } => commands::run::run(&config, &tool, &args, context.as_deref()).await?,
        Commands::Tools { json } => commands::tools::run(&config, json)?,
        Commands::Status => commands::status::run(&config).await?,
        Commands::Config => commands::config_cmd::show(&config, cli.config.as_deref()),
    }

    Ok(())
}
