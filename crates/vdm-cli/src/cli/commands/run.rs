//! `vdm run` — the consumer-thread loop. Owns the Event Bus drain loop
//! and the Safe Callback Registry drain for this process; this thread is
//! the one and only "consumer thread" the core design requires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use vdm_core::bus::EventBus;
use vdm_core::model::{EventKind, EventPayload};
use vdm_core::pool::ThreadPoolRegistry;

use crate::cli::AppContext;

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub fn run_run(ctx: &AppContext, force_resume: bool) -> Result<()> {
    let bus = EventBus::global();
    subscribe_loggers(bus);
    bus.start();

    let auto_resume = force_resume || ctx.settings.get().auto_resume;
    if auto_resume {
        let started = ctx.service.start_all_queued();
        println!("Resumed {started} queued task(s) on startup.");
    }

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown_requested);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .expect("failed to install SIGINT handler");

    println!("vdm running. Press Ctrl+C to stop.");
    while !shutdown_requested.load(Ordering::SeqCst) {
        bus.tick();
        std::thread::sleep(TICK_INTERVAL);
    }

    println!("Shutting down...");
    ctx.service.stop_all();
    let pending_path = vdm_core::paths::pending_downloads_path()?;
    if let Err(err) = ctx.queue.snapshot_pending(&pending_path) {
        tracing::error!(error = %err, "failed to snapshot pending tasks during shutdown");
    }
    let clean = ThreadPoolRegistry::global().shutdown(SHUTDOWN_TIMEOUT);
    let cleared = bus.stop();
    if cleared > 0 {
        println!("discarded {cleared} queued event(s) on shutdown");
    }
    if clean {
        println!("All workers exited cleanly.");
    } else {
        println!("Shutdown timed out; some workers did not exit in time.");
    }
    Ok(())
}

fn subscribe_loggers(bus: &EventBus) {
    bus.subscribe(EventKind::DownloadProgress, |event| {
        if let EventPayload::DownloadProgress { task_id, progress, .. } = &event.payload {
            println!("[{task_id}] {progress:.0}%");
        }
    });
    bus.subscribe(EventKind::DownloadComplete, |event| {
        if let EventPayload::DownloadComplete { task_id, file_path } = &event.payload {
            println!("[{task_id}] completed -> {file_path}");
        }
    });
    bus.subscribe(EventKind::DownloadFailed, |event| {
        if let EventPayload::DownloadFailed { task_id, error } = &event.payload {
            println!("[{task_id}] failed: {error}");
        }
    });
    bus.subscribe(EventKind::DownloadStopped, |event| {
        if let EventPayload::DownloadStopped { task_id, reason } = &event.payload {
            println!("[{task_id}] stopped: {reason}");
        }
    });
    bus.subscribe(EventKind::SettingsChanged, |event| {
        if let EventPayload::SettingsChanged { changed_keys, .. } = &event.payload {
            println!("settings changed: {}", changed_keys.join(", "));
        }
    });
    bus.subscribe(EventKind::SearchComplete, |event| {
        if let EventPayload::SearchComplete { query, result_count, .. } = &event.payload {
            println!("search \"{query}\" complete: {result_count} result(s)");
        }
    });
    bus.subscribe(EventKind::SearchFailed, |event| {
        if let EventPayload::SearchFailed { query, error } = &event.payload {
            println!("search \"{query}\" failed: {error}");
        }
    });
}
