//! `vdm history` — print completed downloads, most recent first.

use anyhow::{Context, Result};
use vdm_core::model::HistoryEntry;

pub fn run_history() -> Result<()> {
    let path = vdm_core::paths::download_history_path()?;
    let entries: Vec<HistoryEntry> = match std::fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).context("parse download history")?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e).with_context(|| format!("read history: {}", path.display())),
    };
    if entries.is_empty() {
        println!("No completed downloads yet.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{:<20} {:<10} {} -> {}",
            entry.completed_at, entry.size_bytes, entry.descriptor.url, entry.final_path
        );
    }
    Ok(())
}
