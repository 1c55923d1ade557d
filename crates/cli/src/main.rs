//! Careline CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP API server
//! - `ingest`  — Crawl plan pages into the document store
//! - `seed`    — Insert sample customers for local testing

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "careline",
    about = "Careline — AI customer consultation backend",
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
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Crawl configured plan pages and load them into the document store
    Ingest {
        /// Re-crawl everything, clearing stored documents first
        #[arg(long)]
        refresh: bool,
    },

    /// Insert sample customers for local testing
    Seed,
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
        Commands::Ingest { refresh } => commands::ingest::run(refresh).await?,
        Commands::Seed => commands::seed::run().await?,
    }

    Ok(())
}
