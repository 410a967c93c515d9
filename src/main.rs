//! # Ragnarok CLI (`rgk`)
//!
//! Open a document held by the remote retrieval service, make sure it is
//! parsed, and ask questions about it.
//!
//! ## Usage
//!
//! ```bash
//! rgk --config ./config/rgk.toml --owner <user> <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rgk view <id>` | Acquire content and print stats (`--raw`, `--chunks`, `--json`) |
//! | `rgk ask <id> "<query>"` | Ask one question and print the answer with sources |
//! | `rgk chat <id>` | Interactive chat on stdin (`/quit` to leave) |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (e.g. `RUST_LOG=ragnarok_client=debug`).

use anyhow::bail;
use clap::{Parser, Subcommand};
use ragnarok_client::chat;
use ragnarok_client::config::{self, Config};
use ragnarok_client::progress::ProgressMode;
use ragnarok_client::session::SessionIdentity;
use ragnarok_client::view::{self, ViewOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ragnarok CLI: chat with your parsed documents.
#[derive(Parser)]
#[command(
    name = "rgk",
    about = "Ragnarok: chat with documents parsed by a remote retrieval service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default path does not exist, built-in defaults are used
    /// (service at http://localhost:5050).
    #[arg(long, global = true, default_value = "./config/rgk.toml")]
    config: PathBuf,

    /// Owner (username) of the document. Overrides `[session].owner`.
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a document's parsed content and print a summary.
    ///
    /// Content that has not been parsed yet is parsed by the service on demand.
    View {
        /// Document identifier.
        document_id: String,

        /// Print the full raw text.
        #[arg(long)]
        raw: bool,

        /// Print every chunk.
        #[arg(long)]
        chunks: bool,

        /// Print the content as JSON instead.
        #[arg(long)]
        json: bool,
    },

    /// Ask a single question about a document.
    Ask {
        /// Document identifier.
        document_id: String,

        /// The question.
        query: String,

        /// Number of chunks the service should retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Chat with a document interactively.
    Chat {
        /// Document identifier.
        document_id: String,

        /// Number of chunks the service should retrieve per question.
        #[arg(long)]
        top_k: Option<usize>,

        /// Write the transcript as JSON to this path on exit.
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
}

fn load(cli: &Cli) -> anyhow::Result<Config> {
    if cli.config.exists() {
        config::load_config(&cli.config)
    } else if cli.config == PathBuf::from("./config/rgk.toml") {
        Ok(Config::minimal())
    } else {
        bail!("Config file not found: {}", cli.config.display())
    }
}

fn identity(cli: &Cli, cfg: &Config, document_id: &str) -> anyhow::Result<SessionIdentity> {
    let owner = cli
        .owner
        .clone()
        .or_else(|| cfg.session.owner.clone())
        .unwrap_or_default();
    let identity = SessionIdentity::new(owner.trim(), document_id.trim());
    if identity.owner.is_empty() {
        bail!("No owner given. Pass --owner or set [session].owner in the config file.");
    }
    if identity.document_id.is_empty() {
        bail!("document id must not be empty");
    }
    Ok(identity)
}

fn with_top_k(mut cfg: Config, top_k: Option<usize>) -> anyhow::Result<Config> {
    if let Some(k) = top_k {
        if k == 0 {
            bail!("--top-k must be >= 1");
        }
        cfg.query.top_k = k;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load(&cli)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match &cli.command {
        Commands::View {
            document_id,
            raw,
            chunks,
            json,
        } => {
            let id = identity(&cli, &cfg, document_id)?;
            let options = ViewOptions {
                raw: *raw,
                chunks: *chunks,
                json: *json,
            };
            view::run_view(&cfg, id, options, progress).await?;
        }
        Commands::Ask {
            document_id,
            query,
            top_k,
            json,
        } => {
            let id = identity(&cli, &cfg, document_id)?;
            let cfg = with_top_k(cfg, *top_k)?;
            chat::run_ask(&cfg, id, query, progress, *json).await?;
        }
        Commands::Chat {
            document_id,
            top_k,
            transcript,
        } => {
            let id = identity(&cli, &cfg, document_id)?;
            let cfg = with_top_k(cfg, *top_k)?;
            chat::run_chat(&cfg, id, transcript.as_deref(), progress).await?;
        }
    }

    Ok(())
}
