mod cli;
mod server;
mod tools;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use whereabouts::config::WhereaboutsConfig;

#[derive(Parser)]
#[command(
    name = "whereabouts",
    version,
    about = "Find where you left things, from your chats and photos"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Extract item locations from a chat log file and index them
    Ingest {
        /// Path to the chat log
        file: PathBuf,
        /// Owner the entries belong to
        #[arg(long)]
        owner: String,
        /// Source reference for the log (defaults to the file stem)
        #[arg(long)]
        source_ref: Option<String>,
    },
    /// Index the detector labels of one image
    IngestImage {
        /// Owner the image belongs to
        #[arg(long)]
        owner: String,
        /// Stable reference for the image
        #[arg(long)]
        image_ref: String,
        /// Detected object labels, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,
        /// Original file name of the image
        #[arg(long)]
        filename: Option<String>,
    },
    /// Ask where something is
    Ask {
        /// The question
        prompt: String,
        /// Owner whose entries are searched
        #[arg(long)]
        owner: String,
        /// Skip chat evidence
        #[arg(long)]
        no_chat: bool,
        /// Skip photo evidence
        #[arg(long)]
        no_image: bool,
    },
    /// Run index diagnostics
    Doctor,
    /// Delete every indexed entry (asks for confirmation)
    Reset,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the CLIP text encoder to ~/.whereabouts/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = WhereaboutsConfig::load()?;

    // stdout carries MCP JSON-RPC, so logs go to stderr.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve_stdio(config).await?;
        }
        Command::Ingest {
            file,
            owner,
            source_ref,
        } => {
            cli::ingest::ingest_chat(&config, &file, &owner, source_ref.as_deref()).await?;
        }
        Command::IngestImage {
            owner,
            image_ref,
            labels,
            filename,
        } => {
            cli::ingest::ingest_image(&config, &owner, &image_ref, &labels, filename.as_deref())
                .await?;
        }
        Command::Ask {
            prompt,
            owner,
            no_chat,
            no_image,
        } => {
            cli::ask::ask(&config, &prompt, &owner, !no_chat, !no_image).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
        Command::Reset => {
            cli::reset::reset(&config)?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}
