//! `vdm add <url>` — add a URL to the download queue.

use std::path::Path;

use anyhow::Result;
use vdm_core::model::VideoDescriptor;

use crate::cli::commands::persist_queue;
use crate::cli::AppContext;

pub fn run_add(
    ctx: &AppContext,
    url: &str,
    download_dir: &Path,
    quality: Option<&str>,
    subtitles: bool,
) -> Result<()> {
    let mut descriptor = VideoDescriptor::new(url, url, "", 0)?.with_subtitles(subtitles);
    if let Some(q) = quality {
        descriptor = descriptor.with_selected_quality(q);
    }
    let download_path = download_dir.join(placeholder_filename(url)).to_string_lossy().into_owned();
    match ctx.queue.add(descriptor, download_path) {
        Ok(task) => {
            println!("Added task {} for {}", task.id, url);
            persist_queue(ctx);
        }
        Err(err) => println!("Could not add {url}: {err}"),
    }
    Ok(())
}

fn placeholder_filename(url: &str) -> String {
    url.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("download").to_string()
}
