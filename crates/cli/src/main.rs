//! Helix CLI entry point.
//!
//! Commands:
//! - `ask`: One-shot question
//! - `chat`: Interactive conversation with budget tracking
//! - `backends`: Show the backend table and tier grants
//! - `config`: Validate or print configuration

use clap::{Parser, Subcommand};
use helix_core::Tier;

mod commands;

#[derive(Parser)]
#[command(
    name = "helix",
    about = "Helix: fault-tolerant multi-backend research assistant",
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
    /// Ask a single question
    Ask {
        /// The question
        query: String,

        /// Subscription tier (free, premium, enterprise)
        #[arg(short, long)]
        tier: Option<Tier>,

        /// Structured context as a JSON string
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Start an interactive conversation
    Chat {
        /// Subscription tier (free, premium, enterprise)
        #[arg(short, long)]
        tier: Option<Tier>,
    },

    /// Show configured backends and tier access
    Backends,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate the active configuration
    Validate,
    /// Print the config file path
    Path,
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
        Commands::Ask {
            query,
            tier,
            context,
        } => commands::ask::run(query, tier, context).await?,
        Commands::Chat { tier } => commands::chat::run(tier).await?,
        Commands::Backends => commands::backends::run().await?,
        Commands::Config { action } => match action {
            None => commands::config_cmd::show_default().await?,
            Some(ConfigAction::Validate) => commands::config_cmd::validate().await?,
            Some(ConfigAction::Path) => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
