//! # NoteFlow CLI (`nf`)
//!
//! The `nf` binary is the primary interface for NoteFlow. It provides
//! commands for database initialization, note management, file import with
//! insight generation, the daily digest, context-primed chat, backup
//! export/restore, and the HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! nf --config ./config/noteflow.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nf init` | Create the SQLite database and run schema migrations |
//! | `nf add "<title>"` | Add a note and generate its insight |
//! | `nf list` | List notes, optionally filtered |
//! | `nf show <id>` | Print one note in full |
//! | `nf edit <id>` | Edit a note's fields |
//! | `nf delete <id>` | Delete a note (insights remain) |
//! | `nf import <paths...>` | Ingest files into notes, generate insights |
//! | `nf insight <id>` | Regenerate an insight for a note |
//! | `nf digest` | Narrative recap of today's notes |
//! | `nf chat` | Interactive chat primed with your notes |
//! | `nf export` | Write the full backup document |
//! | `nf restore <path>` | Re-import a JSON backup or tabular CSV |
//! | `nf serve` | Start the HTTP service |
//! | `nf check` | Report credential and database configuration |

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use noteflow::config;
use noteflow::db;
use noteflow::digest;
use noteflow::export;
use noteflow::ingest;
use noteflow::insight;
use noteflow::llm;
use noteflow::migrate;
use noteflow::notes;
use noteflow::progress::ProgressMode;
use noteflow::remote::{ExtractionService, HttpExtractionService, UnconfiguredExtraction};
use noteflow::server;
use noteflow::store::sqlite::SqliteStore;
use noteflow::store::{NoteChanges, NoteStore};

/// NoteFlow CLI — a context-aware note ingestion and insight pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/noteflow.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "nf",
    about = "NoteFlow — a context-aware note ingestion and insight pipeline",
    version,
    long_about = "NoteFlow turns uploaded files into normalized notes, derives AI-generated \
    insights per note with fallback and retry policy, aggregates notes into a daily digest, \
    and answers chat messages primed with the full note collection."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/noteflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the notes and insights tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Add a note and generate its insight.
    Add {
        /// Note title (must be non-empty).
        title: String,

        /// Free-text summary.
        #[arg(long)]
        summary: Option<String>,

        /// Note type: custom, project, personal, professional, document,
        /// imported, or action. Unknown values fall back to custom.
        #[arg(long = "type")]
        note_type: Option<String>,

        /// Priority: low, medium, or high. Unknown values fall back to medium.
        #[arg(long)]
        priority: Option<String>,

        /// Free-text connection labels (repeatable).
        #[arg(long = "connection")]
        connections: Vec<String>,

        /// Skip insight generation for this note.
        #[arg(long)]
        no_insight: bool,
    },

    /// List notes, newest first.
    List {
        /// Case-insensitive substring filter over title and summary.
        #[arg(long)]
        filter: Option<String>,

        /// Also print recent insights.
        #[arg(long)]
        insights: bool,
    },

    /// Print one note in full.
    Show {
        /// Note id.
        id: String,
    },

    /// Edit a note's fields. Only the given flags change; `updated_at` is
    /// bumped.
    Edit {
        /// Note id.
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long = "type")]
        note_type: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Replace the connection labels (repeatable; pass once with an
        /// empty value to clear).
        #[arg(long = "connection")]
        connections: Vec<String>,
    },

    /// Delete a note. Insights generated from it are kept.
    Delete {
        /// Note id (or insight id with --insight).
        id: String,

        /// Delete an insight record instead of a note.
        #[arg(long)]
        insight: bool,
    },

    /// Ingest files into notes and generate insights.
    ///
    /// Directories are walked for supported files (json, csv, txt, docx,
    /// pdf, jpg, jpeg, png). Failures are per-file: the batch always
    /// finishes and reports success and failure counts. Binary formats
    /// need `[extraction].endpoint` to point at a running `nf serve`.
    Import {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Regenerate an insight for an existing note.
    ///
    /// Each invocation produces an independent insight record.
    Insight {
        /// Note id.
        id: String,
    },

    /// Print a 2-3 sentence narrative recap of today's notes.
    Digest,

    /// Chat with the language model primed with your note collection.
    ///
    /// Without `--message`, runs an interactive loop on stdin.
    Chat {
        /// Send a single message and exit.
        #[arg(long)]
        message: Option<String>,
    },

    /// Export the full note and insight collections as JSON.
    Export {
        /// Output file. Writes to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Restore notes from a JSON export or a `title,summary,type,priority`
    /// CSV (header row required).
    Restore {
        /// Backup file to restore.
        path: PathBuf,
    },

    /// Start the HTTP service (extraction, insight, chat routes).
    Serve,

    /// Report credential and database configuration.
    Check,
}

async fn open_store(cfg: &config::Config) -> anyhow::Result<Arc<dyn NoteStore>> {
    let pool = db::connect(cfg).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

fn extraction_service(cfg: &config::Config) -> Box<dyn ExtractionService> {
    match HttpExtractionService::new(&cfg.extraction) {
        Ok(service) => Box::new(service),
        Err(err) => Box::new(UnconfiguredExtraction(err.to_string())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let owner = cfg.user.owner.clone();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            title,
            summary,
            note_type,
            priority,
            connections,
            no_insight,
        } => {
            let store = open_store(&cfg).await?;
            let service = llm::service_from_config(&cfg.llm);
            let progress = ProgressMode::default_for_tty().reporter();
            let draft = notes::draft_from_args(title, summary, note_type, priority, connections);
            notes::run_add(store, service, &owner, draft, no_insight, progress.as_ref()).await?;
        }
        Commands::List { filter, insights } => {
            let store = open_store(&cfg).await?;
            notes::run_list(store.as_ref(), &owner, filter.as_deref(), insights).await?;
        }
        Commands::Show { id } => {
            let store = open_store(&cfg).await?;
            notes::run_show(store.as_ref(), &owner, &id).await?;
        }
        Commands::Edit {
            id,
            title,
            summary,
            note_type,
            priority,
            connections,
        } => {
            let store = open_store(&cfg).await?;
            let changes = NoteChanges {
                title,
                summary,
                note_type: note_type
                    .as_deref()
                    .map(noteflow::models::NoteType::parse_lenient),
                priority: priority
                    .as_deref()
                    .map(noteflow::models::Priority::parse_lenient),
                connections: if connections.is_empty() {
                    None
                } else {
                    Some(
                        connections
                            .into_iter()
                            .filter(|c| !c.trim().is_empty())
                            .collect(),
                    )
                },
            };
            notes::run_edit(store.as_ref(), &owner, &id, changes).await?;
        }
        Commands::Delete { id, insight } => {
            let store = open_store(&cfg).await?;
            if insight {
                notes::run_delete_insight(store.as_ref(), &owner, &id).await?;
            } else {
                notes::run_delete(store.as_ref(), &owner, &id).await?;
            }
        }
        Commands::Import { paths } => {
            let store = open_store(&cfg).await?;
            let service = llm::service_from_config(&cfg.llm);
            let extraction = extraction_service(&cfg);
            let progress = ProgressMode::default_for_tty().reporter();
            let report = ingest::import_files(
                store,
                extraction.as_ref(),
                service,
                &owner,
                &paths,
                progress.as_ref(),
            )
            .await?;
            ingest::print_report(&report);
        }
        Commands::Insight { id } => {
            let store = open_store(&cfg).await?;
            let service = llm::service_from_config(&cfg.llm);
            let progress = ProgressMode::default_for_tty().reporter();
            insight::run_insight(store, service, &owner, &id, progress.as_ref()).await?;
        }
        Commands::Digest => {
            let store = open_store(&cfg).await?;
            let service = llm::service_from_config(&cfg.llm);
            let all_notes = store.list_notes(&owner).await?;
            digest::run_digest(service.as_ref(), &all_notes).await;
        }
        Commands::Chat { message } => {
            let store = open_store(&cfg).await?;
            let service = llm::service_from_config(&cfg.llm);
            let all_notes = store.list_notes(&owner).await?;
            match message {
                Some(message) => {
                    noteflow::chat::run_once(service.as_ref(), &all_notes, &message).await?
                }
                None => noteflow::chat::run_interactive(service.as_ref(), &all_notes).await?,
            }
        }
        Commands::Export { output } => {
            let store = open_store(&cfg).await?;
            export::run_export(store.as_ref(), &owner, output.as_deref()).await?;
        }
        Commands::Restore { path } => {
            let store = open_store(&cfg).await?;
            export::run_restore(store, &owner, &path).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Check => {
            let status = server::config_status(&cfg);
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
