//! Command-line interface for mediasearch.

mod commands;
mod runtime;

use clap::{Parser, Subcommand};
use mediasearch::config::{Settings, SettingsError};
use mediasearch::PipelineError;

pub use runtime::Runtime;

/// Sysexits-style codes for operational tooling.
mod exit_codes {
    pub const INVALID_INPUT: i32 = 64;
    pub const DEPENDENCY_UNAVAILABLE: i32 = 69;
    pub const RETRYABLE_FAILURE: i32 = 75;
    pub const CONFIG_ERROR: i32 = 78;
}

#[derive(Debug, Parser)]
#[command(name = "mediasearch", about = "Searchable media library pipeline")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the data directory
    #[arg(long, global = true, env = "MEDIASEARCH_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the search and triage HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Watch buckets for uploads and run the transcription pipeline
    Watch {
        /// Buckets to watch
        #[arg(default_values_t = vec!["media".to_string()])]
        buckets: Vec<String>,
    },
    /// Ingest a single media file and wait for it to publish
    Ingest {
        /// Path to a local media file
        file: std::path::PathBuf,
        /// Target bucket
        #[arg(long, default_value = "media")]
        bucket: String,
        /// Object key (defaults to the file name)
        #[arg(long)]
        key: Option<String>,
    },
    /// Search indexed transcripts
    Search {
        /// Query text
        query: String,
        /// keyword | semantic | hybrid
        #[arg(long = "type", default_value = "keyword")]
        mode: String,
        /// Max results
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Result offset
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Operate on quarantined assets
    Triage {
        #[command(subcommand)]
        action: TriageAction,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Debug, Subcommand)]
enum TriageAction {
    /// List quarantined assets
    List,
    /// Retry a quarantined asset with a fresh attempt budget
    Retry { asset_id: String },
    /// Mark a quarantined asset as terminally failed
    Skip { asset_id: String },
}

#[derive(Debug, Subcommand)]
enum DbAction {
    /// Create the database and apply the schema
    Init,
    /// Delete archived versions past the retention window
    Purge,
}

/// Peek at argv for the verbose flag before clap runs, so logging can be
/// initialized first.
pub fn is_verbose() -> bool {
    std::env::args().any(|a| a == "-v" || a == "--verbose")
}

/// Map an error chain onto the documented exit codes.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<SettingsError>().is_some() {
        return exit_codes::CONFIG_ERROR;
    }
    if let Some(e) = error.downcast_ref::<PipelineError>() {
        return match e {
            PipelineError::InvalidInput(_)
            | PipelineError::NotFound(_)
            | PipelineError::MediaFormat(_) => exit_codes::INVALID_INPUT,
            PipelineError::EngineConfig(_) => exit_codes::CONFIG_ERROR,
            PipelineError::Database(_) | PipelineError::PermanentDownstream(_) => {
                exit_codes::DEPENDENCY_UNAVAILABLE
            }
            PipelineError::TransientNetwork(_)
            | PipelineError::TransientResource(_)
            | PipelineError::Timeout { .. }
            | PipelineError::ObjectFetch { .. } => exit_codes::RETRYABLE_FAILURE,
            _ => 1,
        };
    }
    1
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }

    match cli.command {
        Command::Serve { port } => commands::serve::cmd_serve(settings, port).await,
        Command::Watch { buckets } => commands::watch::cmd_watch(settings, buckets).await,
        Command::Ingest { file, bucket, key } => {
            commands::ingest::cmd_ingest(settings, &file, &bucket, key.as_deref()).await
        }
        Command::Search {
            query,
            mode,
            limit,
            offset,
        } => commands::search::cmd_search(settings, &query, &mode, limit, offset).await,
        Command::Triage { action } => match action {
            TriageAction::List => commands::triage::cmd_triage_list(settings).await,
            TriageAction::Retry { asset_id } => {
                commands::triage::cmd_triage_retry(settings, &asset_id).await
            }
            TriageAction::Skip { asset_id } => {
                commands::triage::cmd_triage_skip(settings, &asset_id).await
            }
        },
        Command::Db { action } => match action {
            DbAction::Init => commands::db::cmd_db_init(settings).await,
            DbAction::Purge => commands::db::cmd_db_purge(settings).await,
        },
    }
}
