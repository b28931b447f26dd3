//! CLI for the VDM download manager: a terminal harness standing in for
//! the GUI frontend the core is designed around. Every subcommand talks
//! to the same process-wide singletons (`EventBus::global()`,
//! `ThreadPoolRegistry::global()`) the real GUI would use.

mod commands;
mod fetcher;
mod search_backend;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use vdm_core::queue::QueueStore;
use vdm_core::search::SearchService;
use vdm_core::service::DownloadService;
use vdm_core::settings::SettingsStore;

pub use commands::{
    run_add, run_completions, run_history, run_list, run_man, run_run, run_search,
    run_settings_get, run_settings_reset, run_settings_set, run_start, run_status, run_stop,
    run_stop_all,
};

/// Shared handles every subcommand needs: the Settings Store, Queue
/// Store, Download Service, and Search Service, all process-wide
/// singletons for the lifetime of this invocation.
pub struct AppContext {
    pub settings: Arc<SettingsStore>,
    pub queue: Arc<QueueStore>,
    pub service: Arc<DownloadService>,
    pub search: Arc<SearchService>,
}

impl AppContext {
    fn load() -> Result<Self> {
        let settings = Arc::new(SettingsStore::load_or_default(vdm_core::paths::settings_path()?)?);
        let queue = Arc::new(QueueStore::new());

        let pending_path = vdm_core::paths::pending_downloads_path()?;
        if pending_path.exists() {
            for task in QueueStore::load_pending(&pending_path)? {
                let _ = queue.add(task.descriptor, task.download_path);
            }
        }

        let history_path = vdm_core::paths::download_history_path()?;
        let service = Arc::new(DownloadService::new(
            Arc::clone(&queue),
            Arc::new(fetcher::UnimplementedFetcher),
            history_path,
        ));

        let search = Arc::new(SearchService::new(Arc::new(search_backend::UnimplementedSearchBackend)));

        Ok(Self { settings, queue, service, search })
    }
}

#[derive(Debug, Parser)]
#[command(name = "vdm")]
#[command(about = "VDM: concurrent video-download orchestration runtime", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a URL to the download queue.
    Add {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        /// Directory where the file will be saved (default: current directory).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
        /// Preferred quality label (default: "best").
        #[arg(long)]
        quality: Option<String>,
        /// Also attempt to download subtitles.
        #[arg(long)]
        subtitles: bool,
    },

    /// Start a queued task by id.
    Start { id: u64 },

    /// Request cancellation of a running or queued task by id.
    Stop { id: u64 },

    /// Request cancellation of every active task.
    StopAll,

    /// List tasks, optionally filtered by status.
    List {
        #[arg(long, value_enum)]
        status: Option<commands::StatusFilter>,
    },

    /// Show a single task's full record.
    Status { id: u64 },

    /// Print completed downloads, most recent first.
    History,

    /// Submit a query to the search backend.
    Search {
        query: String,
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Settings operations.
    Settings {
        #[command(subcommand)]
        action: commands::SettingsAction,
    },

    /// Run the consumer loop: drains the Event Bus, prints events, and
    /// optionally resumes queued tasks on startup. Exits cleanly on
    /// SIGINT after snapshotting pending tasks.
    Run {
        /// Resume tasks from the pending snapshot and start them
        /// immediately, regardless of the `auto_resume` setting.
        #[arg(long)]
        resume: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print a man page to stdout.
    Man,
}

impl Cli {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        match cli.command {
            Command::Add { url, download_dir, quality, subtitles } => {
                let ctx = AppContext::load()?;
                let dir = download_dir.or_else(|| std::env::current_dir().ok()).unwrap_or_default();
                run_add(&ctx, &url, &dir, quality.as_deref(), subtitles)?;
            }
            Command::Start { id } => {
                let ctx = AppContext::load()?;
                run_start(&ctx, id)?;
            }
            Command::Stop { id } => {
                let ctx = AppContext::load()?;
                run_stop(&ctx, id)?;
            }
            Command::StopAll => {
                let ctx = AppContext::load()?;
                run_stop_all(&ctx)?;
            }
            Command::List { status } => {
                let ctx = AppContext::load()?;
                run_list(&ctx, status)?;
            }
            Command::Status { id } => {
                let ctx = AppContext::load()?;
                run_status(&ctx, id)?;
            }
            Command::History => {
                run_history()?;
            }
            Command::Search { query, max_results } => {
                let ctx = AppContext::load()?;
                run_search(&ctx, &query, max_results)?;
            }
            Command::Settings { action } => {
                let ctx = AppContext::load()?;
                match action {
                    commands::SettingsAction::Get { key } => run_settings_get(&ctx, key)?,
                    commands::SettingsAction::Set { key, value } => run_settings_set(&ctx, &key, &value)?,
                    commands::SettingsAction::Reset => run_settings_reset(&ctx)?,
                }
            }
            Command::Run { resume } => {
                let ctx = AppContext::load()?;
                run_run(&ctx, resume)?;
            }
            Command::Completions { shell } => run_completions(shell)?,
            Command::Man => run_man()?,
        }
        Ok(())
    }
}
