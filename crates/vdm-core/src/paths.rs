//! XDG file locations for the three persisted JSON documents: settings,
//! the pending-download snapshot, and the download history.

use std::path::PathBuf;

use anyhow::Result;

const APP_PREFIX: &str = "vdm";

/// `~/.config/vdm/settings.json` on Unix-like systems (XDG config home).
pub fn settings_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_PREFIX)?;
    Ok(xdg_dirs.place_config_file("settings.json")?)
}

/// `~/.local/state/vdm/pending_downloads.json` (XDG state home).
pub fn pending_downloads_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_PREFIX)?;
    let dir = xdg_dirs.get_state_home().join(APP_PREFIX);
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("pending_downloads.json"))
}

/// `~/.local/state/vdm/download_history.json` (XDG state home).
pub fn download_history_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_PREFIX)?;
    let dir = xdg_dirs.get_state_home().join(APP_PREFIX);
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("download_history.json"))
}
