//! Queue Store: the thread-safe registry of download tasks. All public
//! operations acquire a single reentrant lock; readers receive copies.
//!
//! Persistence follows the same JSON-under-XDG pattern as the Settings
//! Store: `serde_json::to_string_pretty` + `std::fs::write`, wrapped in
//! `anyhow::Context`.

use std::cell::RefCell;
use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::EventBus;
use crate::model::{DownloadTask, Event, EventPayload, QueueAction, TaskId, TaskStatus, VideoDescriptor};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("url already present in the queue")]
    DuplicateUrl,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedQueue {
    #[serde(default = "default_version")]
    version: u32,
    tasks: Vec<DownloadTask>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

/// Legal predecessor states for each target status, per the state
/// machine in the Download Service design. `update_status` is the only
/// place this table is consulted; terminal states are sticky.
fn transition_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    match to {
        Downloading => from == Queued,
        Completed | Failed => from == Downloading,
        Stopped => matches!(from, Queued | Downloading),
        Queued => false,
    }
}

struct Inner {
    tasks: Vec<DownloadTask>,
    next_id: TaskId,
}

/// Thread-safe registry of `DownloadTask`s, guarded by a reentrant lock
/// so `clear`/`import` can call `remove` internally without deadlocking.
pub struct QueueStore {
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self { inner: ReentrantMutex::new(RefCell::new(Inner { tasks: Vec::new(), next_id: 1 })) }
    }

    /// Append a new Queued task. Fails with `DuplicateUrl` if
    /// `descriptor.url` is already represented among live tasks.
    pub fn add(&self, descriptor: VideoDescriptor, download_path: String) -> Result<DownloadTask, QueueError> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.tasks.iter().any(|t| t.descriptor.url == descriptor.url) {
            return Err(QueueError::DuplicateUrl);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let task = DownloadTask::new(id, descriptor, download_path);
        inner.tasks.push(task.clone());
        let task_count = inner.tasks.len();
        drop(inner);
        drop(guard);
        self.publish_update(QueueAction::Add, Some(id), task_count);
        Ok(task)
    }

    /// Removes by id; returns whether a task with that id was present.
    pub fn remove(&self, id: TaskId) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        let removed = inner.tasks.len() != before;
        let task_count = inner.tasks.len();
        drop(inner);
        drop(guard);
        if removed {
            self.publish_update(QueueAction::Remove, Some(id), task_count);
        }
        removed
    }

    pub fn get(&self, id: TaskId) -> Option<DownloadTask> {
        let guard = self.inner.lock();
        guard.borrow().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn all(&self) -> Vec<DownloadTask> {
        let guard = self.inner.lock();
        guard.borrow().tasks.clone()
    }

    pub fn by_status(&self, status: TaskStatus) -> Vec<DownloadTask> {
        let guard = self.inner.lock();
        guard.borrow().tasks.iter().filter(|t| t.status == status).cloned().collect()
    }

    pub fn is_url_present(&self, url: &str) -> bool {
        let guard = self.inner.lock();
        guard.borrow().tasks.iter().any(|t| t.descriptor.url == url)
    }

    /// Enforces transition legality; sets status/progress/error atomically
    /// and publishes `QueueUpdated`. Returns `false` if the task doesn't
    /// exist or the transition is illegal (terminal states are sticky).
    pub fn update_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        progress: Option<f64>,
        error: Option<String>,
    ) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.status.is_terminal() || !transition_allowed(task.status, status) {
            return false;
        }
        task.status = status;
        if let Some(p) = progress {
            task.progress = p;
        }
        match status {
            TaskStatus::Completed => {
                task.progress = 100.0;
                task.completed_at = Some(crate::model::unix_now());
            }
            TaskStatus::Failed => {
                task.completed_at = Some(crate::model::unix_now());
                task.error_message = error.or(task.error_message.take());
            }
            TaskStatus::Stopped => {
                task.completed_at = Some(crate::model::unix_now());
            }
            _ => {}
        }
        let task_count = inner.tasks.len();
        drop(inner);
        drop(guard);
        self.publish_update(QueueAction::Update, Some(id), task_count);
        true
    }

    /// Sets `progress` on a Downloading task without touching `status`.
    /// Used by the Download Service's progress sink to report throttled
    /// intermediate progress; `update_status` remains the only mutator of
    /// `status` itself. Returns `false` if the task isn't Downloading.
    pub fn update_progress(&self, id: TaskId, progress: f64) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) else { return false };
        if task.status != TaskStatus::Downloading {
            return false;
        }
        task.progress = progress;
        true
    }

    /// Removes all tasks; publishes `QueueUpdated`.
    pub fn clear(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().tasks.clear();
        drop(guard);
        self.publish_update(QueueAction::Clear, None, 0);
    }

    /// Writes every task with status in {Queued, Downloading, Stopped} to
    /// `target`. Downloading is normalized to Queued so a crash mid-flight
    /// resumes cleanly.
    pub fn snapshot_pending(&self, target: &Path) -> Result<()> {
        let guard = self.inner.lock();
        let pending: Vec<DownloadTask> = guard
            .borrow()
            .tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Queued | TaskStatus::Downloading | TaskStatus::Stopped))
            .map(|t| {
                let mut t = t.clone();
                if t.status == TaskStatus::Downloading {
                    t.status = TaskStatus::Queued;
                }
                t
            })
            .collect();
        drop(guard);
        write_json(target, &PersistedQueue { version: SCHEMA_VERSION, tasks: pending })
    }

    /// Reads and validates a pending snapshot, normalizing any lingering
    /// Downloading status to Queued. Does not merge into `self`; callers
    /// decide whether/how to re-add returned tasks.
    pub fn load_pending(source: &Path) -> Result<Vec<DownloadTask>> {
        let persisted: PersistedQueue = read_json(source)?;
        Ok(persisted
            .tasks
            .into_iter()
            .map(|mut t| {
                if t.status == TaskStatus::Downloading {
                    t.status = TaskStatus::Queued;
                }
                t
            })
            .collect())
    }

    /// Bulk export of every task in a stable schema.
    pub fn export(&self, target: &Path) -> Result<()> {
        let tasks = self.all();
        write_json(target, &PersistedQueue { version: SCHEMA_VERSION, tasks })
    }

    /// Bulk import: appends every task from `source` whose url is not
    /// already present. Returns the count actually imported.
    pub fn import(&self, source: &Path) -> Result<usize> {
        let persisted: PersistedQueue = read_json(source)?;
        let mut imported = 0;
        for task in persisted.tasks {
            if self.add(task.descriptor, task.download_path).is_ok() {
                imported += 1;
            }
        }
        Ok(imported)
    }

    fn publish_update(&self, action: QueueAction, task_id: Option<TaskId>, task_count: usize) {
        EventBus::global().publish(Event::new(EventPayload::QueueUpdated { action, task_id, task_count }));
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("serialize queue snapshot")?;
    std::fs::write(path, json).with_context(|| format!("write queue snapshot: {}", path.display()))?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read queue snapshot: {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse queue snapshot: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn descriptor(url: &str) -> VideoDescriptor {
        VideoDescriptor::new(url, "t", "a", 0).unwrap()
    }

    #[test]
    fn add_rejects_duplicate_url() {
        let store = QueueStore::new();
        store.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        assert_eq!(store.add(descriptor("https://x/1"), "/tmp".into()), Err(QueueError::DuplicateUrl));
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn concurrent_add_admits_exactly_one_duplicate() {
        use std::sync::Arc;
        let store = Arc::new(QueueStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || store.add(descriptor("https://x/dup"), "/tmp".into()).is_ok()));
        }
        let successes: usize = handles.into_iter().map(|h| h.join().unwrap() as usize).sum();
        assert_eq!(successes, 1);
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn update_status_enforces_transition_legality() {
        let store = QueueStore::new();
        let task = store.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        assert!(store.update_status(task.id, TaskStatus::Downloading, None, None));
        assert!(store.update_status(task.id, TaskStatus::Completed, Some(100.0), None));
        // Terminal: further transitions are rejected.
        assert!(!store.update_status(task.id, TaskStatus::Queued, None, None));
        assert!(!store.update_status(task.id, TaskStatus::Downloading, None, None));
    }

    #[test]
    fn queued_to_stopped_is_legal() {
        let store = QueueStore::new();
        let task = store.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        assert!(store.update_status(task.id, TaskStatus::Stopped, None, None));
        assert_eq!(store.get(task.id).unwrap().status, TaskStatus::Stopped);
    }

    #[test]
    fn failed_requires_error_message() {
        let store = QueueStore::new();
        let task = store.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        store.update_status(task.id, TaskStatus::Downloading, None, None);
        store.update_status(task.id, TaskStatus::Failed, None, Some("network error".into()));
        let reloaded = store.get(task.id).unwrap();
        assert_eq!(reloaded.status, TaskStatus::Failed);
        assert_eq!(reloaded.error_message.as_deref(), Some("network error"));
    }

    #[test]
    fn snapshot_pending_normalizes_downloading_to_queued() {
        let store = QueueStore::new();
        let task = store.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        store.update_status(task.id, TaskStatus::Downloading, Some(40.0), None);

        let dir = tempdir().unwrap();
        let path = dir.path().join("pending.json");
        store.snapshot_pending(&path).unwrap();

        let loaded = QueueStore::load_pending(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, TaskStatus::Queued);
    }

    #[test]
    fn snapshot_pending_excludes_terminal_tasks() {
        let store = QueueStore::new();
        let done = store.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        store.update_status(done.id, TaskStatus::Downloading, None, None);
        store.update_status(done.id, TaskStatus::Completed, None, None);
        store.add(descriptor("https://x/2"), "/tmp".into()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("pending.json");
        store.snapshot_pending(&path).unwrap();
        let loaded = QueueStore::load_pending(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].descriptor.url, "https://x/2");
    }

    #[test]
    fn export_import_round_trips() {
        let source = QueueStore::new();
        source.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        source.add(descriptor("https://x/2"), "/tmp".into()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        source.export(&path).unwrap();

        let dest = QueueStore::new();
        let imported = dest.import(&path).unwrap();
        assert_eq!(imported, 2);
        assert_eq!(dest.all().len(), 2);
    }

    #[test]
    fn import_skips_duplicates_already_present() {
        let dest = QueueStore::new();
        dest.add(descriptor("https://x/1"), "/tmp".into()).unwrap();

        let source = QueueStore::new();
        source.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        source.add(descriptor("https://x/2"), "/tmp".into()).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        source.export(&path).unwrap();

        let imported = dest.import(&path).unwrap();
        assert_eq!(imported, 1);
        assert_eq!(dest.all().len(), 2);
    }

    #[test]
    fn clear_removes_all_and_publishes() {
        let store = QueueStore::new();
        store.add(descriptor("https://x/1"), "/tmp".into()).unwrap();
        store.clear();
        assert!(store.all().is_empty());
    }
}
