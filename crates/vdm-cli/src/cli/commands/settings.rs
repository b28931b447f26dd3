//! `vdm settings get|set|reset` — inspect and mutate the Settings Store.

use anyhow::{bail, Result};
use clap::Subcommand;

use crate::cli::AppContext;

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print the current settings snapshot as JSON.
    Get {
        /// Print only this key instead of the whole snapshot.
        key: Option<String>,
    },
    /// Set a single key to a value.
    Set { key: String, value: String },
    /// Restore every key to its default value.
    Reset,
}

pub fn run_settings_get(ctx: &AppContext, key: Option<String>) -> Result<()> {
    let snapshot = ctx.settings.get();
    match key.as_deref() {
        None => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        Some("download_directory") => println!("{}", snapshot.download_directory),
        Some("theme") => println!("{}", serde_json::to_string(&snapshot.theme)?),
        Some("download_mode") => println!("{}", serde_json::to_string(&snapshot.download_mode)?),
        Some("subtitle_download") => println!("{}", snapshot.subtitle_download),
        Some("notifications_enabled") => println!("{}", snapshot.notifications_enabled),
        Some("auto_resume") => println!("{}", snapshot.auto_resume),
        Some("debug_thread_safety") => println!("{}", snapshot.debug_thread_safety),
        Some(other) => bail!("unknown settings key: {other}"),
    }
    Ok(())
}

pub fn run_settings_set(ctx: &AppContext, key: &str, value: &str) -> Result<()> {
    match key {
        "download_directory" | "theme" | "download_mode" | "subtitle_download"
        | "notifications_enabled" | "auto_resume" | "debug_thread_safety" => {
            ctx.settings.set(key, value)?;
        }
        other => bail!("unknown settings key: {other}"),
    }
    println!("{key} = {value}");
    Ok(())
}

pub fn run_settings_reset(ctx: &AppContext) -> Result<()> {
    ctx.settings.reset_to_defaults();
    println!("Settings reset to defaults.");
    Ok(())
}
