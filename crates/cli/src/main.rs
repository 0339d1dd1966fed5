//! Hearth CLI — the main entry point.
//!
//! Commands:
//! - `chat`     — Interactive chat or single-message mode
//! - `personas` — List available personas
//! - `memory`   — Inspect or clear persona memory
//! - `gateway`  — Start the HTTP server

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "hearth",
    about = "Hearth — persona chat runtime for local LLMs",
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
    /// Chat with a persona
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Persona id (defaults to the first available persona)
        #[arg(short, long)]
        persona: Option<String>,
    },

    /// List available personas
    Personas,

    /// Inspect or clear persona memory
    Memory {
        #[command(subcommand)]
        command: commands::memory::MemoryCommand,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message, persona } => commands::chat::run(message, persona).await?,
        Commands::Personas => commands::personas::run()?,
        Commands::Memory { command } => commands::memory::run(command).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
    }

    Ok(())
}
