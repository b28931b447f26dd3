//! Settings Store: a process-wide configuration cell with atomic
//! read/write, persistence on mutation, and change notification.
//!
//! Guarded by a reentrant lock because `set_theme`/`set_download_mode`
//! internally call `set`. Persistence follows the same JSON-under-XDG
//! pattern the teacher crate uses for its host policy file: write the
//! whole snapshot, pretty-printed, on every change.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use thiserror::Error;

use crate::bus::EventBus;
use crate::model::EventPayload;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadMode {
    Sequential,
    MultiThreaded,
}

/// Value-type copy of the settings cell. Every `get`/`SettingsChanged`
/// payload carries one of these; callers never see a reference into the
/// store's internal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub download_directory: String,
    pub theme: Theme,
    pub download_mode: DownloadMode,
    pub subtitle_download: bool,
    pub notifications_enabled: bool,
    pub auto_resume: bool,
    pub debug_thread_safety: bool,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            download_directory: default_download_directory(),
            theme: Theme::Dark,
            download_mode: DownloadMode::Sequential,
            subtitle_download: false,
            notifications_enabled: true,
            auto_resume: false,
            debug_thread_safety: false,
        }
    }
}

fn default_download_directory() -> String {
    dirs_home().join("Downloads").to_string_lossy().into_owned()
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid theme, expected dark or light")]
    InvalidTheme,
    #[error("invalid download mode, expected sequential or multi-threaded")]
    InvalidDownloadMode,
    #[error("download_directory must be non-empty")]
    EmptyDownloadDirectory,
    #[error("invalid boolean value, expected true or false")]
    InvalidBoolean,
}

fn parse_theme(value: &str) -> Result<Theme, SettingsError> {
    match value {
        "dark" => Ok(Theme::Dark),
        "light" => Ok(Theme::Light),
        _ => Err(SettingsError::InvalidTheme),
    }
}

fn parse_download_mode(value: &str) -> Result<DownloadMode, SettingsError> {
    match value {
        "sequential" => Ok(DownloadMode::Sequential),
        "multi-threaded" => Ok(DownloadMode::MultiThreaded),
        _ => Err(SettingsError::InvalidDownloadMode),
    }
}

fn parse_bool(value: &str) -> Result<bool, SettingsError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(SettingsError::InvalidBoolean),
    }
}

struct State {
    snapshot: SettingsSnapshot,
    path: PathBuf,
}

/// Process-wide configuration cell. Construct one with `load_or_default`
/// at startup; hold it behind an `Arc` where a consumer needs shared
/// access.
pub struct SettingsStore {
    inner: ReentrantMutex<RefCell<State>>,
}

impl SettingsStore {
    /// Load `path` if present, otherwise start from defaults. Does not
    /// write anything until the first mutating `set`.
    pub fn load_or_default(path: PathBuf) -> Result<Self> {
        let snapshot = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parse settings: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SettingsSnapshot::default(),
            Err(e) => return Err(e).with_context(|| format!("read settings: {}", path.display())),
        };
        Ok(Self { inner: ReentrantMutex::new(RefCell::new(State { snapshot, path })) })
    }

    /// Construct an in-memory-only store (tests, or a headless run with
    /// no durable state).
    pub fn in_memory(path: PathBuf) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(State {
                snapshot: SettingsSnapshot::default(),
                path,
            })),
        }
    }

    /// Returns a value-type copy of the current settings.
    pub fn get(&self) -> SettingsSnapshot {
        let guard = self.inner.lock();
        guard.borrow().snapshot.clone()
    }

    pub fn get_download_directory(&self) -> String {
        self.get().download_directory
    }

    /// Generic entry point matching the design's `set(key, value)`
    /// contract. `set_theme` and friends are typed convenience wrappers
    /// that validate, then call through to this — while still holding
    /// the lock they took to read the current value, which is why the
    /// lock must be reentrant rather than a plain mutex.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "download_directory" => self.set_download_directory(value),
            "theme" => self.set_theme(parse_theme(value)?),
            "download_mode" => self.set_download_mode(parse_download_mode(value)?),
            "subtitle_download" => self.set_subtitle_download(parse_bool(value)?),
            "notifications_enabled" => self.set_notifications_enabled(parse_bool(value)?),
            "auto_resume" => self.set_auto_resume(parse_bool(value)?),
            "debug_thread_safety" => self.set_debug_thread_safety(parse_bool(value)?),
            _ => Ok(()),
        }
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), SettingsError> {
        // Holds the lock for the duration of this call, then re-enters it
        // via `mutate` below — legal only because `inner` is a
        // `ReentrantMutex`.
        let _outer = self.inner.lock();
        self.mutate(&["theme"], |s| {
            s.theme = theme;
            Ok(())
        })
    }

    pub fn set_download_mode(&self, mode: DownloadMode) -> Result<(), SettingsError> {
        let _outer = self.inner.lock();
        self.mutate(&["download_mode"], |s| {
            s.download_mode = mode;
            Ok(())
        })
    }

    pub fn set_download_directory(&self, dir: impl Into<String>) -> Result<(), SettingsError> {
        let dir = dir.into();
        if dir.is_empty() {
            return Err(SettingsError::EmptyDownloadDirectory);
        }
        self.mutate(&["download_directory"], |s| {
            s.download_directory = dir.clone();
            Ok(())
        })
    }

    pub fn set_subtitle_download(&self, enabled: bool) -> Result<(), SettingsError> {
        self.mutate(&["subtitle_download"], |s| {
            s.subtitle_download = enabled;
            Ok(())
        })
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.mutate(&["notifications_enabled"], |s| {
            s.notifications_enabled = enabled;
            Ok(())
        })
    }

    pub fn set_auto_resume(&self, enabled: bool) -> Result<(), SettingsError> {
        self.mutate(&["auto_resume"], |s| {
            s.auto_resume = enabled;
            Ok(())
        })
    }

    pub fn set_debug_thread_safety(&self, enabled: bool) -> Result<(), SettingsError> {
        self.mutate(&["debug_thread_safety"], |s| {
            s.debug_thread_safety = enabled;
            Ok(())
        })
    }

    /// Reset every key to its default value, persist, and publish a
    /// single `SettingsChanged` listing every key.
    pub fn reset_to_defaults(&self) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        state.snapshot = SettingsSnapshot::default();
        let path = state.path.clone();
        let snapshot = state.snapshot.clone();
        drop(state);
        persist(&path, &snapshot);
        publish_changed(all_keys(), snapshot);
    }

    fn mutate(
        &self,
        changed_keys: &[&str],
        f: impl FnOnce(&mut SettingsSnapshot) -> Result<(), SettingsError>,
    ) -> Result<(), SettingsError> {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        let before = state.snapshot.clone();
        f(&mut state.snapshot)?;
        if state.snapshot == before {
            return Ok(());
        }
        let path = state.path.clone();
        let snapshot = state.snapshot.clone();
        drop(state);
        persist(&path, &snapshot);
        publish_changed(changed_keys.iter().map(|s| s.to_string()).collect(), snapshot);
        Ok(())
    }
}

fn all_keys() -> Vec<String> {
    [
        "download_directory",
        "theme",
        "download_mode",
        "subtitle_download",
        "notifications_enabled",
        "auto_resume",
        "debug_thread_safety",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Persistence failure is logged and the in-memory update retained (open
/// question in the design notes resolved this way: the change event is
/// still published even if the write failed).
fn persist(path: &Path, snapshot: &SettingsSnapshot) {
    if let Err(err) = persist_inner(path, snapshot) {
        tracing::error!(path = %path.display(), error = %err, "failed to persist settings");
    }
}

fn persist_inner(path: &Path, snapshot: &SettingsSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot).context("serialize settings")?;
    std::fs::write(path, json).with_context(|| format!("write settings: {}", path.display()))?;
    Ok(())
}

fn publish_changed(changed_keys: Vec<String>, settings: SettingsSnapshot) {
    EventBus::global().publish(crate::model::Event::new(EventPayload::SettingsChanged {
        changed_keys,
        settings,
    }));
}
