//! Data model: descriptors, tasks, history entries, events and subscriptions.
//!
//! Mirrors the data model in the design spec almost verbatim: immutable
//! descriptors, mutable tasks owned exclusively by the Queue Store, and an
//! append-only history of completed downloads.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque unique task identifier, stable for the task's lifetime.
pub type TaskId = u64;

/// Opaque token returned by `EventBus::subscribe`, required to unsubscribe.
pub type SubscriptionId = u64;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("url must be non-empty and start with http:// or https://")]
    InvalidUrl,
}

/// Immutable record describing what to fetch. Validated at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub url: String,
    pub title: String,
    pub author: String,
    pub duration_seconds: u64,
    pub thumbnail_url: Option<String>,
    pub available_qualities: Vec<String>,
    pub selected_quality: String,
    pub filename_hint: Option<String>,
    pub download_subtitles: bool,
}

impl VideoDescriptor {
    /// Construct a descriptor, validating the url and defaulting
    /// `selected_quality` to `"best"` when the caller passes an empty string.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        duration_seconds: u64,
    ) -> Result<Self, DescriptorError> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|_| DescriptorError::InvalidUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DescriptorError::InvalidUrl);
        }
        Ok(Self {
            url,
            title: title.into(),
            author: author.into(),
            duration_seconds,
            thumbnail_url: None,
            available_qualities: Vec::new(),
            selected_quality: "best".to_string(),
            filename_hint: None,
            download_subtitles: false,
        })
    }

    pub fn with_selected_quality(mut self, quality: impl Into<String>) -> Self {
        self.selected_quality = quality.into();
        self
    }

    pub fn with_subtitles(mut self, download_subtitles: bool) -> Self {
        self.download_subtitles = download_subtitles;
        self
    }
}

/// Lifecycle status of a `DownloadTask`. See the state machine in the
/// Download Service for legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
    Stopped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Stopped)
    }
}

/// Mutable record. Only the Queue Store may mutate `status`/`progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: TaskId,
    pub descriptor: VideoDescriptor,
    pub status: TaskStatus,
    pub progress: f64,
    pub download_path: String,
    pub created_at: u64,
    pub completed_at: Option<u64>,
    pub error_message: Option<String>,
}

impl DownloadTask {
    pub(crate) fn new(id: TaskId, descriptor: VideoDescriptor, download_path: String) -> Self {
        Self {
            id,
            descriptor,
            status: TaskStatus::Queued,
            progress: 0.0,
            download_path,
            created_at: unix_now(),
            completed_at: None,
            error_message: None,
        }
    }
}

/// Immutable record of a completed download, appended by the Download
/// Service after a `Completed` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: TaskId,
    pub descriptor: VideoDescriptor,
    pub final_path: String,
    pub completed_at: u64,
    pub size_bytes: u64,
}

/// The closed set of event kinds the core publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    DownloadProgress,
    DownloadComplete,
    DownloadFailed,
    DownloadStopped,
    QueueUpdated,
    SettingsChanged,
    SearchComplete,
    SearchFailed,
}

/// Action recorded in a `QueueUpdated` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueAction {
    Add,
    Remove,
    Update,
    Clear,
}

/// Per-`EventKind` payload. The Event carries the variant; subscribers
/// pattern-match instead of indexing into an untyped map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    DownloadProgress {
        task_id: TaskId,
        progress: f64,
        downloaded_bytes: Option<u64>,
        total_bytes: Option<u64>,
    },
    DownloadComplete {
        task_id: TaskId,
        file_path: String,
    },
    DownloadFailed {
        task_id: TaskId,
        error: String,
    },
    DownloadStopped {
        task_id: TaskId,
        reason: String,
    },
    QueueUpdated {
        action: QueueAction,
        task_id: Option<TaskId>,
        task_count: usize,
    },
    SettingsChanged {
        changed_keys: Vec<String>,
        settings: crate::settings::SettingsSnapshot,
    },
    SearchComplete {
        query: String,
        results: Vec<crate::search::SearchHit>,
        result_count: usize,
    },
    SearchFailed {
        query: String,
        error: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::DownloadProgress { .. } => EventKind::DownloadProgress,
            EventPayload::DownloadComplete { .. } => EventKind::DownloadComplete,
            EventPayload::DownloadFailed { .. } => EventKind::DownloadFailed,
            EventPayload::DownloadStopped { .. } => EventKind::DownloadStopped,
            EventPayload::QueueUpdated { .. } => EventKind::QueueUpdated,
            EventPayload::SettingsChanged { .. } => EventKind::SettingsChanged,
            EventPayload::SearchComplete { .. } => EventKind::SearchComplete,
            EventPayload::SearchFailed { .. } => EventKind::SearchFailed,
        }
    }
}

/// Discriminated value delivered by the Event Bus. Immutable after
/// publication; owned briefly by the producer, then transferred to the
/// bus's queue and consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub payload: EventPayload,
    pub timestamp: u64,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self { payload, timestamp: unix_now() }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_rejects_bad_url() {
        assert!(VideoDescriptor::new("ftp://x", "t", "a", 0).is_err());
        assert!(VideoDescriptor::new("", "t", "a", 0).is_err());
    }

    #[test]
    fn descriptor_defaults_best_quality() {
        let d = VideoDescriptor::new("https://x/1", "t", "a", 10).unwrap();
        assert_eq!(d.selected_quality, "best");
        assert!(!d.download_subtitles);
    }

    #[test]
    fn task_starts_queued_with_zero_progress() {
        let d = VideoDescriptor::new("https://x/1", "t", "a", 10).unwrap();
        let task = DownloadTask::new(1, d, "/tmp".to_string());
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0.0);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Stopped.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Downloading.is_terminal());
    }
}
