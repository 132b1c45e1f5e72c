//! Wayfarer CLI: the main entry point.
//!
//! Commands:
//! - `run`      — Run an agent to completion and print its report
//! - `stream`   — Run an agent and print each step as it happens
//! - `gateway`  — Start the HTTP API server
//! - `config`   — Show, locate or initialize the config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer — step-bounded LLM agent engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent to completion and print its report
    Run {
        /// What the agent should do
        prompt: String,

        /// Agent profile (general, health); defaults to the configured one
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Run an agent and print each step as soon as it completes
    Stream {
        /// What the agent should do
        prompt: String,

        /// Agent profile (general, health); defaults to the configured one
        #[arg(short, long)]
        profile: Option<String>,

        /// Give up after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration, API keys masked
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
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
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { prompt, profile } => commands::agent::run(prompt, profile).await?,
        Commands::Stream {
            prompt,
            profile,
            timeout,
        } => commands::agent::stream(prompt, profile, timeout).await?,
        Commands::Gateway { host, port } => commands::gateway::run(host, port).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path()?,
            ConfigAction::Init { force } => commands::config_cmd::init(force)?,
        },
    }

    Ok(())
}
