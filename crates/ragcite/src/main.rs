//! # ragcite CLI
//!
//! ## Usage
//!
//! ```bash
//! ragcite [--config ./ragcite.toml] [-v] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragcite chunk <file>` | Chunk a file and print quality statistics |
//! | `ragcite ask <file> <question>...` | Index a file and answer questions with citations |
//! | `ragcite info` | Show configured providers and parameters |
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=ragcite=debug`) or
//! pass `-v` / `-vv` to see pipeline stages.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragcite::commands::{self, AskOptions};
use ragcite::config::{self, Config};

/// Retrieval-augmented answers with numbered citations.
#[derive(Parser)]
#[command(name = "ragcite", version, about)]
struct Cli {
    /// Path to a TOML configuration file. Without one, the offline
    /// defaults are used (hash embeddings, local rerank, extractive answers).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a document into chunks and report chunk quality.
    Chunk {
        /// Text file to chunk.
        file: PathBuf,

        /// Print chunks and statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Index a document and answer one or more questions about it.
    Ask {
        /// Text file to index.
        file: PathBuf,

        /// Questions to answer, in order.
        #[arg(required = true)]
        questions: Vec<String>,

        /// Number of chunks handed to the generator.
        #[arg(long)]
        top_k: Option<usize>,

        /// Document title (defaults to the file stem).
        #[arg(long)]
        title: Option<String>,

        /// Document source label (defaults to the file path).
        #[arg(long)]
        source: Option<String>,

        /// Print `{success, ...}` JSON payloads.
        #[arg(long)]
        json: bool,
    },

    /// Show the configured providers and parameters.
    Info {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "ragcite=info,ragcite_core=info",
        _ => "ragcite=debug,ragcite_core=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Chunk { file, json } => {
            commands::run_chunk(&cfg, &file, json)?;
        }
        Commands::Ask {
            file,
            questions,
            top_k,
            title,
            source,
            json,
        } => {
            commands::run_ask(
                &cfg,
                AskOptions {
                    path: &file,
                    questions: &questions,
                    top_k,
                    title,
                    source,
                    as_json: json,
                },
            )
            .await?;
        }
        Commands::Info { json } => {
            commands::run_info(&cfg, json).await?;
        }
    }

    Ok(())
}
