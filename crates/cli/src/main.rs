//! QuestWeaver CLI: the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP gateway
//! - `chat`    Interactive or single-message play in the terminal
//! - `agents`  List the agents discovery finds
//! - `init`    Write a default config and seed sample agents

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "questweaver",
    about = "QuestWeaver: an LLM game master that orchestrates tool agents",
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
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Play in the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Play as this user identity
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List discovered agents and where they came from
    Agents,

    /// Write the default config and seed sample agents into the store
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { message, user } => commands::chat::run(message, user, cli.verbose).await?,
        Commands::Agents => commands::agents::run().await?,
        Commands::Init => commands::init::run().await?,
    }

    Ok(())
}
