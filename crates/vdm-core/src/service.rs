//! Download Service: the per-task state machine. Owns the decision of
//! whether and when to run a task, drives its progress, and terminates
//! it cleanly — cooperative cancellation only, never force-termination.
//!
//! The `active`/`cancel` maps and their single lock mirror the teacher
//! crate's `control::JobControl` (`register`/`unregister`/`request_abort`
//! over `RwLock<HashMap<TaskId, Arc<AtomicBool>>>`), adapted to the
//! spec's worker-body/completion-callback split.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::EventBus;
use crate::errors::{classify, ErrorContext, FetchErrorKind};
use crate::fetcher::{MediaFetcher, ProgressSink, SubtitleOutcome};
use crate::model::{Event, EventPayload, HistoryEntry, TaskId, TaskStatus};
use crate::pool::ThreadPoolRegistry;
use crate::queue::QueueStore;

/// Cooperative one-shot cancellation flag shared between the Service
/// (writer) and the worker's progress sink (reader).
pub type CancellationToken = Arc<AtomicBool>;

/// Drives the throttling rule in the worker body: a `DownloadProgress`
/// event is published (and the task's queue-visible progress updated)
/// only when the integer percent crosses a 5-percent boundary, or on
/// reaching 100.
struct CancelSink {
    token: CancellationToken,
    queue: Arc<QueueStore>,
    task_id: TaskId,
    last_boundary: i64,
}

impl CancelSink {
    fn new(token: CancellationToken, queue: Arc<QueueStore>, task_id: TaskId) -> Self {
        Self { token, queue, task_id, last_boundary: -1 }
    }
}

/// Thrown from inside the worker body via `MediaFetcher` to signal that
/// cancellation, not failure, ended the download.
const CANCEL_SIGNAL: &str = "cancelled";

impl ProgressSink for CancelSink {
    fn on_progress(&mut self, downloaded_bytes: u64, total_bytes: Option<u64>) {
        if self.token.load(Ordering::SeqCst) {
            return;
        }
        let Some(total) = total_bytes else { return };
        if total == 0 {
            return;
        }
        let percent = ((downloaded_bytes as f64 / total as f64) * 100.0).clamp(0.0, 100.0);
        let boundary = ((percent / 5.0).floor() as i64) * 5;
        let crossed_boundary = boundary > self.last_boundary;
        let reached_end = percent >= 100.0 && self.last_boundary < 100;
        if !crossed_boundary && !reached_end {
            return;
        }
        self.last_boundary = if reached_end { 100 } else { boundary };
        self.queue.update_progress(self.task_id, percent);
        publish(EventPayload::DownloadProgress {
            task_id: self.task_id,
            progress: percent,
            downloaded_bytes: Some(downloaded_bytes),
            total_bytes: Some(total),
        });
    }

    fn is_cancelled(&self) -> bool {
        self.token.load(Ordering::SeqCst)
    }
}

/// Per-task shared state guarded by the service lock.
struct Shared {
    active: HashMap<TaskId, ()>,
    cancel: HashMap<TaskId, CancellationToken>,
}

/// Orchestrates task lifecycle across the Queue Store and the
/// `download_pool`. One instance per process; holds `Arc` handles to its
/// collaborators, including its own lock, so worker closures submitted to
/// the pool can report completion without borrowing `&self` across the
/// `'static` boundary rayon requires.
pub struct DownloadService {
    queue: Arc<QueueStore>,
    fetcher: Arc<dyn MediaFetcher>,
    history_path: PathBuf,
    shared: Arc<Mutex<Shared>>,
}

impl DownloadService {
    pub fn new(queue: Arc<QueueStore>, fetcher: Arc<dyn MediaFetcher>, history_path: PathBuf) -> Self {
        Self {
            queue,
            fetcher,
            history_path,
            shared: Arc::new(Mutex::new(Shared { active: HashMap::new(), cancel: HashMap::new() })),
        }
    }

    /// Validates the task exists and isn't already running; submits the
    /// worker to `download_pool`. Returns `false` without side effects if
    /// the task is unknown or already active.
    pub fn start(&self, task_id: TaskId) -> bool {
        let Some(task) = self.queue.get(task_id) else { return false };
        if task.status.is_terminal() {
            return false;
        }
        let token: CancellationToken = {
            let mut shared = self.shared.lock();
            if shared.active.contains_key(&task_id) {
                return false;
            }
            let token: CancellationToken = Arc::new(AtomicBool::new(false));
            shared.cancel.insert(task_id, token.clone());
            shared.active.insert(task_id, ());
            token
        };

        let queue = Arc::clone(&self.queue);
        let fetcher = Arc::clone(&self.fetcher);
        let history_path = self.history_path.clone();
        let shared = Arc::clone(&self.shared);

        let registry = ThreadPoolRegistry::global();
        let Ok(pool) = registry.download_pool() else {
            finish(&self.shared, task_id);
            return false;
        };

        let submitted = pool.submit(move || {
            run_worker(task_id, queue, fetcher, history_path, token);
            finish(&shared, task_id);
        });

        if submitted.is_err() {
            finish(&self.shared, task_id);
            return false;
        }
        true
    }

    /// Sets the cancellation token for `task_id` if one is recorded.
    /// Returns `false` if the task is not currently active.
    pub fn stop(&self, task_id: TaskId) -> bool {
        let shared = self.shared.lock();
        match shared.cancel.get(&task_id) {
            Some(token) => {
                token.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Sets every recorded cancellation token.
    pub fn stop_all(&self) {
        let shared = self.shared.lock();
        for token in shared.cancel.values() {
            token.store(true, Ordering::SeqCst);
        }
    }

    /// Starts every task currently Queued. Errors in one do not affect
    /// others; returns the number successfully started.
    pub fn start_all_queued(&self) -> usize {
        self.queue
            .by_status(TaskStatus::Queued)
            .into_iter()
            .filter(|t| self.start(t.id))
            .count()
    }

    pub fn active_count(&self) -> usize {
        self.shared.lock().active.len()
    }
}

/// Removes the bookkeeping entries for `task_id`. Called from the
/// completion callback, which per the design never touches UI state
/// directly — only `active`/`cancel` map mutation and event publication
/// (done by `run_worker` before this runs).
fn finish(shared: &Mutex<Shared>, task_id: TaskId) {
    let mut guard = shared.lock();
    guard.active.remove(&task_id);
    guard.cancel.remove(&task_id);
}

fn run_worker(
    task_id: TaskId,
    queue: Arc<QueueStore>,
    fetcher: Arc<dyn MediaFetcher>,
    history_path: PathBuf,
    token: CancellationToken,
) {
    let Some(task) = queue.get(task_id) else { return };

    if !queue.update_status(task_id, TaskStatus::Downloading, Some(0.0), None) {
        return;
    }
    publish(EventPayload::DownloadProgress {
        task_id,
        progress: 0.0,
        downloaded_bytes: None,
        total_bytes: None,
    });

    if token.load(Ordering::SeqCst) {
        finish_stopped(&queue, task_id, "cancelled before download started");
        return;
    }

    let mut sink = CancelSink::new(token.clone(), Arc::clone(&queue), task_id);
    let path = std::path::Path::new(&task.download_path);

    let outcome = if task.descriptor.download_subtitles {
        fetcher
            .fetch_with_subtitles(&task.descriptor, path, &mut sink)
            .map(|(final_path, subtitle_outcome)| (final_path, Some(subtitle_outcome)))
    } else {
        fetcher.fetch(&task.descriptor, path, &mut sink).map(|p| (p, None))
    };

    if token.load(Ordering::SeqCst) {
        finish_stopped(&queue, task_id, "cancelled");
        return;
    }

    match outcome {
        Ok((final_path, subtitle_outcome)) => {
            if let Some(SubtitleOutcome::NotFound) = subtitle_outcome {
                tracing::debug!(task_id, "subtitle acquisition failed, media succeeded: treating as non-fatal");
            }
            queue.update_status(task_id, TaskStatus::Completed, Some(100.0), None);
            append_history(&history_path, &task.descriptor, &final_path);
            publish(EventPayload::DownloadComplete { task_id, file_path: final_path });
        }
        Err(err) => {
            let message = err.to_string();
            let context = ErrorContext { task_id, url: task.descriptor.url.clone(), operation: "fetch" };
            let kind = classify(&message);
            if kind == FetchErrorKind::Cancelled || message == CANCEL_SIGNAL {
                finish_stopped(&queue, task_id, "cancelled");
                return;
            }
            let classified = crate::errors::classify_and_log(&message, &context);
            let rendered = format!("{classified}: {message}");
            queue.update_status(task_id, TaskStatus::Failed, None, Some(rendered.clone()));
            publish(EventPayload::DownloadFailed { task_id, error: rendered });
        }
    }
}

fn finish_stopped(queue: &QueueStore, task_id: TaskId, reason: &str) {
    queue.update_status(task_id, TaskStatus::Stopped, None, None);
    publish(EventPayload::DownloadStopped { task_id, reason: reason.to_string() });
}

fn append_history(path: &std::path::Path, descriptor: &crate::model::VideoDescriptor, final_path: &str) {
    let entry = HistoryEntry {
        id: 0,
        descriptor: descriptor.clone(),
        final_path: final_path.to_string(),
        completed_at: crate::model::unix_now(),
        size_bytes: std::fs::metadata(final_path).map(|m| m.len()).unwrap_or(0),
    };
    if let Err(err) = append_history_inner(path, entry) {
        tracing::error!(path = %path.display(), error = %err, "failed to append download history");
    }
}

fn append_history_inner(path: &std::path::Path, entry: HistoryEntry) -> anyhow::Result<()> {
    use anyhow::Context;
    let mut entries: Vec<HistoryEntry> = match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).context("parse history")?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e).context("read history"),
    };
    entries.insert(0, entry);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("create history dir")?;
    }
    let json = serde_json::to_string_pretty(&entries).context("serialize history")?;
    std::fs::write(path, json).context("write history")?;
    Ok(())
}

fn publish(payload: EventPayload) {
    EventBus::global().publish(Event::new(payload));
}
