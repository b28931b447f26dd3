mod add;
mod completions;
mod history;
mod list;
mod man;
mod run;
mod search;
mod settings;
mod status;
mod stop;

pub use add::run_add;
pub use completions::run_completions;
pub use history::run_history;
pub use list::run_list;
pub use man::run_man;
pub use run::run_run;
pub use search::run_search;
pub use settings::{run_settings_get, run_settings_reset, run_settings_set, SettingsAction};
pub use status::run_status;
pub use stop::{run_start, run_stop, run_stop_all};

use crate::cli::AppContext;
use clap::ValueEnum;

/// Snapshots the queue to the pending-downloads file so the next `vdm`
/// invocation in this or another process picks up the mutation. Every
/// subcommand is its own short-lived process with its own in-memory
/// `QueueStore`, so this is the only channel a mutation has to reach a
/// sibling invocation (no cross-process coordination otherwise).
/// Failures are logged, not propagated: a missed snapshot should not
/// fail the command whose primary effect already succeeded.
pub(crate) fn persist_queue(ctx: &AppContext) {
    match vdm_core::paths::pending_downloads_path() {
        Ok(path) => {
            if let Err(err) = ctx.queue.snapshot_pending(&path) {
                tracing::error!(error = %err, "failed to persist queue snapshot");
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to resolve pending downloads path");
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Queued,
    Downloading,
    Completed,
    Failed,
    Stopped,
}

impl From<StatusFilter> for vdm_core::model::TaskStatus {
    fn from(value: StatusFilter) -> Self {
        match value {
            StatusFilter::Queued => vdm_core::model::TaskStatus::Queued,
            StatusFilter::Downloading => vdm_core::model::TaskStatus::Downloading,
            StatusFilter::Completed => vdm_core::model::TaskStatus::Completed,
            StatusFilter::Failed => vdm_core::model::TaskStatus::Failed,
            StatusFilter::Stopped => vdm_core::model::TaskStatus::Stopped,
        }
    }
}
