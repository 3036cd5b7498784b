//! ChatRelay CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Write a default config file
//! - `gateway`  Start the HTTP server (alias: `serve`)
//! - `chat`     Chat from the terminal, optionally with retrieval
//! - `ingest`   Split text files and add them to the vector store
//! - `doctor`   Diagnose configuration and connectivity

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "ChatRelay: HTTP front-end for chat-completion models",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CHATRELAY_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Start the HTTP gateway server
    #[command(alias = "serve")]
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the model from the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation to continue (enables memory)
        #[arg(short, long)]
        conversation_id: Option<String>,

        /// Ground answers in the vector store
        #[arg(long)]
        rag: bool,
    },

    /// Add text files to the vector store
    Ingest {
        /// UTF-8 text files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Diagnose configuration and provider connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Chat {
            message,
            conversation_id,
            rag,
        } => commands::chat::run(message, conversation_id, rag).await?,
        Commands::Ingest { files } => commands::ingest::run(files).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
