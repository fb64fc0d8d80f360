//! # Assist Harness CLI (`assist`)
//!
//! Offline tooling around the state engine: inspect what the ingestion
//! pipeline would pick up, browse an exported chat history, and check which
//! feedback documents attach to which exchanges.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `assist scan <paths…>` | Resolve paths into ingestion candidates |
//! | `assist sessions <history.json>` | List exported sessions by age |
//! | `assist reconcile <history.json> <feedback…>` | Attach feedback offline |
//!
//! ## Examples
//!
//! ```bash
//! # What would a directory contribute?
//! assist scan ~/reports --recursive
//!
//! # Run a full upload round against the in-memory backend
//! assist scan ~/reports --simulate-upload --progress human
//!
//! # Sessions grouped by age, plus the id a new chat would get
//! assist sessions ./history.json --next-id
//!
//! # Which exchanges do these feedback documents rate?
//! assist reconcile ./history.json ./feedback_docs/feedback_1.txt
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use assist_harness::config::{self, Config};
use assist_harness::engine::Engine;
use assist_harness::history::{group_by_age, load_export};
use assist_harness::memory_backend::InMemoryBackend;
use assist_harness::progress::ProgressMode;
use assist_harness_core::feedback::{reconcile, FeedbackDocument, ReconcileRules};
use assist_harness_core::ids::next_session_id;
use assist_harness_core::models::{FeedbackKind, IngestFile};

/// Assist Harness CLI: offline tools for the assistant state engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/assist.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "assist",
    about = "Assist Harness: offline tools for the assistant state engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/assist.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/assist.toml")]
    config: PathBuf,

    /// Upload progress output. Defaults to `human` on a TTY, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve files and directories into ingestion candidates.
    ///
    /// Applies the extension allow-list and the catalog's duplicate check,
    /// then prints what would be uploaded.
    Scan {
        /// Files or directories to resolve.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Descend into subdirectories (overrides `ingest.recursive`).
        #[arg(long)]
        recursive: bool,

        /// Upload the candidates to an in-memory backend and print the
        /// resulting statuses.
        #[arg(long)]
        simulate_upload: bool,
    },

    /// List the sessions of a history export, grouped by age.
    Sessions {
        /// JSON array of sessions.
        history: PathBuf,

        /// Also print the id a new session would receive.
        #[arg(long)]
        next_id: bool,
    },

    /// Attach feedback documents to the exchanges of a history export.
    Reconcile {
        /// JSON array of sessions.
        history: PathBuf,

        /// Feedback documents to match.
        #[arg(required = true)]
        feedback: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = config::load_or_minimal(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Scan {
            paths,
            recursive,
            simulate_upload,
        } => {
            if recursive {
                cfg.ingest.recursive = true;
            }
            run_scan(&cfg, &paths, simulate_upload, progress).await?;
        }
        Commands::Sessions { history, next_id } => {
            run_sessions(&history, next_id)?;
        }
        Commands::Reconcile { history, feedback } => {
            run_reconcile(&cfg, &history, &feedback)?;
        }
    }

    Ok(())
}

async fn run_scan(
    cfg: &Config,
    paths: &[PathBuf],
    simulate_upload: bool,
    progress: ProgressMode,
) -> Result<()> {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = Engine::new(backend, cfg, progress.reporter())?;
    engine.attach();

    let admitted = engine.ingest_mut().add_paths(paths);
    if admitted.is_empty() {
        println!("No files matched.");
        return Ok(());
    }

    if simulate_upload {
        engine.upload().await?;
    }

    print_files(engine.ingest().catalog().files());
    println!();
    println!("{} file(s)", admitted.len());
    Ok(())
}

fn print_files(files: &[IngestFile]) {
    println!("{:>4}  {:<40}  {:>10}  STATUS", "ID", "NAME", "SIZE");
    for file in files {
        println!(
            "{:>4}  {:<40}  {:>10}  {}",
            file.id,
            file.name,
            file.size_label(),
            file.status
        );
    }
}

fn run_sessions(history: &Path, next_id: bool) -> Result<()> {
    let sessions = load_export(history)?;
    if sessions.is_empty() {
        println!("No sessions.");
    }

    for (age, members) in group_by_age(&sessions, Utc::now()) {
        println!("{}", age.label());
        for session in members {
            let name = if session.name.is_empty() {
                "(untitled)"
            } else {
                session.name.as_str()
            };
            println!(
                "  [{}] {}  ({} messages)",
                session.sid,
                name,
                session.messages.len()
            );
        }
    }

    if next_id {
        println!(
            "next session id: {}",
            next_session_id(sessions.iter().map(|s| s.sid))
        );
    }
    Ok(())
}

fn run_reconcile(cfg: &Config, history: &Path, feedback: &[PathBuf]) -> Result<()> {
    let mut sessions = load_export(history)?;

    let mut docs = Vec::with_capacity(feedback.len());
    for path in feedback {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feedback document: {}", path.display()))?;
        docs.push(FeedbackDocument {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            dir: path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            content,
        });
    }

    let rules = ReconcileRules {
        positive_marker: cfg.feedback.positive_marker.clone(),
    };
    let attached = reconcile(&mut sessions, &docs, &rules);
    if attached.is_empty() {
        println!("No feedback matched.");
        return Ok(());
    }

    for a in &attached {
        let kind = match a.kind {
            FeedbackKind::Positive => "positive",
            FeedbackKind::Negative => "negative",
        };
        let source = sessions
            .iter()
            .find(|s| s.sid == a.sid)
            .and_then(|s| s.messages.get(a.message_index))
            .and_then(|m| m.feedback.as_ref())
            .map(|f| f.rag_file.name.as_str())
            .unwrap_or("?");
        println!(
            "session {} message {}: {} ({})",
            a.sid, a.message_index, kind, source
        );
    }
    Ok(())
}
