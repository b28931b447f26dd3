//! End-to-end exercise of the public API across the Queue Store,
//! Download Service, Event Bus, and Settings Store, following the
//! golden-path and edge-case scenarios the component design calls out.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::tempdir;

use vdm_core::bus::EventBus;
use vdm_core::fetcher::{MediaFetcher, ProgressSink, SubtitleOutcome};
use vdm_core::model::{EventKind, EventPayload, TaskStatus, VideoDescriptor};
use vdm_core::queue::{QueueError, QueueStore};
use vdm_core::service::DownloadService;
use vdm_core::settings::SettingsStore;

/// Deterministic fetcher driven entirely by its configuration: reports a
/// fixed progress sequence, optionally fails, optionally reports a 404'd
/// subtitle alongside a successful media fetch.
struct ScriptedFetcher {
    steps: Vec<(u64, u64)>,
    final_path: String,
    fail_with: Option<String>,
    subtitle_outcome: SubtitleOutcome,
}

impl MediaFetcher for ScriptedFetcher {
    fn describe(&self, url: &str) -> anyhow::Result<VideoDescriptor> {
        VideoDescriptor::new(url, "title", "author", 0).map_err(Into::into)
    }

    fn fetch(
        &self,
        _descriptor: &VideoDescriptor,
        _path: &Path,
        sink: &mut dyn ProgressSink,
    ) -> anyhow::Result<String> {
        for (downloaded, total) in &self.steps {
            if sink.is_cancelled() {
                anyhow::bail!("cancelled");
            }
            sink.on_progress(*downloaded, Some(*total));
            std::thread::sleep(Duration::from_millis(2));
        }
        if sink.is_cancelled() {
            anyhow::bail!("cancelled");
        }
        if let Some(msg) = &self.fail_with {
            anyhow::bail!(msg.clone());
        }
        Ok(self.final_path.clone())
    }

    fn fetch_with_subtitles(
        &self,
        descriptor: &VideoDescriptor,
        path: &Path,
        sink: &mut dyn ProgressSink,
    ) -> anyhow::Result<(String, SubtitleOutcome)> {
        self.fetch(descriptor, path, sink).map(|p| (p, self.subtitle_outcome.clone()))
    }
}

/// Waits until `predicate` holds or `timeout` elapses, draining `bus` on
/// every poll so subscriber callbacks (this crate's only delivery path)
/// actually run.
fn wait_for(bus: &EventBus, timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        bus.tick();
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// S1 (add then complete), S2 (cancel before/after start), S3 (duplicate
/// url), S5 (subtitle 404 is non-fatal): driven through `DownloadService`
/// and `download_pool`, observed through the Event Bus, settled in the
/// Queue Store.
#[test]
fn queue_service_and_bus_cooperate_across_scenarios() {
    let bus = EventBus::global();
    bus.start();

    let completed: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let completed_cb = Arc::clone(&completed);
    let sub_complete = bus.subscribe(EventKind::DownloadComplete, move |event| {
        if let EventPayload::DownloadComplete { task_id, .. } = &event.payload {
            completed_cb.lock().unwrap().push(*task_id);
        }
    });

    let stopped: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let stopped_cb = Arc::clone(&stopped);
    let sub_stopped = bus.subscribe(EventKind::DownloadStopped, move |event| {
        if let EventPayload::DownloadStopped { task_id, .. } = &event.payload {
            stopped_cb.lock().unwrap().push(*task_id);
        }
    });

    let progress_seen: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let progress_cb = Arc::clone(&progress_seen);
    let sub_progress = bus.subscribe(EventKind::DownloadProgress, move |_| {
        progress_cb.fetch_add(1, Ordering::SeqCst);
    });

    let queue = Arc::new(QueueStore::new());
    let history_path = tempdir().unwrap().path().join("history.json");

    // S1: add then complete.
    let fetcher_ok = Arc::new(ScriptedFetcher {
        steps: vec![(10, 100), (55, 100)],
        final_path: "/tmp/s1.mp4".into(),
        fail_with: None,
        subtitle_outcome: SubtitleOutcome::Skipped,
    });
    let service_ok = DownloadService::new(Arc::clone(&queue), fetcher_ok, history_path.clone());
    let task_s1 = queue.add(VideoDescriptor::new("https://x/s1", "t", "a", 0).unwrap(), "/tmp/s1".into()).unwrap();
    assert_eq!(task_s1.status, TaskStatus::Queued);
    assert!(service_ok.start(task_s1.id));
    assert!(wait_for(bus, Duration::from_secs(2), || {
        queue.get(task_s1.id).map(|t| t.status == TaskStatus::Completed).unwrap_or(false)
    }));
    let s1_final = queue.get(task_s1.id).unwrap();
    assert_eq!(s1_final.progress, 100.0);
    assert!(completed.lock().unwrap().contains(&task_s1.id));
    assert!(progress_seen.load(Ordering::SeqCst) > 0);

    // S2: cancel immediately after start, before the worker reports its
    // first progress step.
    let fetcher_slow = Arc::new(ScriptedFetcher {
        steps: vec![(10, 100), (20, 100), (30, 100)],
        final_path: "/tmp/s2.mp4".into(),
        fail_with: None,
        subtitle_outcome: SubtitleOutcome::Skipped,
    });
    let service_cancel = DownloadService::new(Arc::clone(&queue), fetcher_slow, history_path.clone());
    let task_s2 = queue.add(VideoDescriptor::new("https://x/s2", "t", "a", 0).unwrap(), "/tmp/s2".into()).unwrap();
    assert!(!service_cancel.stop(task_s2.id), "no token exists before start");
    assert!(service_cancel.start(task_s2.id));
    service_cancel.stop(task_s2.id);
    assert!(wait_for(bus, Duration::from_secs(2), || {
        queue.get(task_s2.id).map(|t| t.status == TaskStatus::Stopped).unwrap_or(false)
    }));
    assert!(stopped.lock().unwrap().contains(&task_s2.id));

    // S3: duplicate url, concurrently.
    let dup_url = "https://x/s3";
    let mut handles = Vec::new();
    for _ in 0..4 {
        let queue = Arc::clone(&queue);
        handles.push(std::thread::spawn(move || {
            queue.add(VideoDescriptor::new(dup_url, "t", "a", 0).unwrap(), "/tmp/s3".into())
        }));
    }
    let results: Vec<Result<_, QueueError>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|r| matches!(r, Err(QueueError::DuplicateUrl))).count(), 3);
    assert_eq!(queue.all().iter().filter(|t| t.descriptor.url == dup_url).count(), 1);

    // S5: subtitle 404 is non-fatal; exactly one DownloadComplete, zero
    // DownloadFailed.
    let failed: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let failed_cb = Arc::clone(&failed);
    let sub_failed = bus.subscribe(EventKind::DownloadFailed, move |event| {
        if let EventPayload::DownloadFailed { task_id, .. } = &event.payload {
            failed_cb.lock().unwrap().push(*task_id);
        }
    });
    let fetcher_subtitle = Arc::new(ScriptedFetcher {
        steps: vec![(50, 100)],
        final_path: "/tmp/s5.mp4".into(),
        fail_with: None,
        subtitle_outcome: SubtitleOutcome::NotFound,
    });
    let service_subtitle = DownloadService::new(Arc::clone(&queue), fetcher_subtitle, history_path.clone());
    let task_s5 = queue
        .add(
            VideoDescriptor::new("https://x/s5", "t", "a", 0).unwrap().with_subtitles(true),
            "/tmp/s5".into(),
        )
        .unwrap();
    assert!(service_subtitle.start(task_s5.id));
    assert!(wait_for(bus, Duration::from_secs(2), || {
        queue.get(task_s5.id).map(|t| t.status == TaskStatus::Completed).unwrap_or(false)
    }));
    assert!(completed.lock().unwrap().contains(&task_s5.id));
    assert!(!failed.lock().unwrap().contains(&task_s5.id));

    bus.unsubscribe(sub_complete);
    bus.unsubscribe(sub_stopped);
    bus.unsubscribe(sub_progress);
    bus.unsubscribe(sub_failed);
}

/// S6: pending tasks survive a simulated process restart via
/// `snapshot_pending`/`load_pending`, with Downloading normalized back to
/// Queued. Also exercises the Settings Store's persistence independent of
/// the queue, as a second collaborator an app-level caller coordinates
/// alongside it.
#[test]
fn queue_snapshot_survives_restart_and_settings_persist_independently() {
    let queue = Arc::new(QueueStore::new());
    let t1 = queue.add(VideoDescriptor::new("https://x/r1", "t", "a", 0).unwrap(), "/tmp/r1".into()).unwrap();
    let t2 = queue.add(VideoDescriptor::new("https://x/r2", "t", "a", 0).unwrap(), "/tmp/r2".into()).unwrap();
    queue.update_status(t1.id, TaskStatus::Downloading, Some(40.0), None);
    queue.update_status(t2.id, TaskStatus::Downloading, None, None);
    queue.update_status(t2.id, TaskStatus::Completed, None, None);

    let dir = tempdir().unwrap();
    let snapshot_path = dir.path().join("pending.json");
    queue.snapshot_pending(&snapshot_path).unwrap();

    // A fresh `QueueStore` stands in for a new process picking the file
    // back up.
    let reloaded_tasks = QueueStore::load_pending(&snapshot_path).unwrap();
    assert_eq!(reloaded_tasks.len(), 1, "completed task must not be carried over");
    assert_eq!(reloaded_tasks[0].status, TaskStatus::Queued, "downloading normalizes to queued");
    assert_eq!(reloaded_tasks[0].descriptor.url, "https://x/r1");

    let reloaded_queue = QueueStore::new();
    for task in reloaded_tasks {
        reloaded_queue.add(task.descriptor, task.download_path).unwrap();
    }
    assert_eq!(reloaded_queue.by_status(TaskStatus::Queued).len(), 1);

    let settings_path = dir.path().join("settings.json");
    let settings = SettingsStore::load_or_default(settings_path.clone()).unwrap();
    settings.set("auto_resume", "true").unwrap();
    settings.set("theme", "dark").unwrap();

    let reloaded_settings = SettingsStore::load_or_default(settings_path).unwrap();
    let snapshot = reloaded_settings.get();
    assert!(snapshot.auto_resume);
}

/// Confirms the shutdown-time contract used by `vdm run`: stopping the
/// bus after queued events accumulate clears and reports them, same as
/// the Queue Store's own snapshot captures only non-terminal tasks.
#[test]
fn bus_stop_reports_cleared_count_used_by_shutdown() {
    let queue = Arc::new(QueueStore::new());
    for i in 0..3 {
        queue
            .add(VideoDescriptor::new(&format!("https://x/shutdown{i}"), "t", "a", 0).unwrap(), "/tmp".into())
            .unwrap();
    }
    // `QueueStore::add` itself publishes a `QueueUpdated` event per call,
    // giving the global bus queued events to discard on stop.
    let bus = EventBus::global();
    let was_running = bus.is_running();
    if !was_running {
        bus.start();
    }
    let before = bus.queue_size();
    assert!(before >= 3);
    let cleared = bus.stop();
    assert_eq!(cleared, before);
    assert_eq!(bus.queue_size(), 0);
    bus.start();
}
