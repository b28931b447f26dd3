//! Thread-Pool Registry: a process singleton owning two named, bounded
//! worker pools (`download_pool`, `search_pool`) and a coordinated,
//! idempotent shutdown protocol.
//!
//! Each pool is a `rayon::ThreadPool` capped at a small, fixed worker
//! count with a diagnosable thread-name prefix. Submitted work is
//! cancelled cooperatively via the caller's own `CancellationToken`, not
//! by force-terminating threads — the registry has no way to interrupt a
//! worker that ignores its token; such workers are leaked to the OS, per
//! the design's concurrency model.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use thiserror::Error;

const POOL_SIZE: usize = 3;
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("thread pool registry is shut down")]
    ShutDown,
    #[error("failed to build worker pool: {0}")]
    BuildFailed(String),
}

/// A single named, bounded worker pool. Tracks in-flight work so
/// `shutdown` can poll for quiescence.
pub struct NamedPool {
    pool: rayon::ThreadPool,
    active: Arc<AtomicUsize>,
    accepting: AtomicBool,
}

impl NamedPool {
    fn build(prefix: &'static str) -> Result<Self, PoolError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(POOL_SIZE)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| PoolError::BuildFailed(e.to_string()))?;
        Ok(Self {
            pool,
            active: Arc::new(AtomicUsize::new(0)),
            accepting: AtomicBool::new(true),
        })
    }

    /// Submit work to the pool. Returns `ShutDown` without running `task`
    /// if the registry has already been shut down.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(PoolError::ShutDown);
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        self.pool.spawn(move || {
            task();
            active.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }
}

/// Process-wide singleton owning `download_pool` and `search_pool`.
pub struct ThreadPoolRegistry {
    download_pool: NamedPool,
    search_pool: NamedPool,
    shut_down: AtomicBool,
}

static INSTANCE: OnceLock<ThreadPoolRegistry> = OnceLock::new();

impl ThreadPoolRegistry {
    /// Lazily and race-free initialized process-wide singleton
    /// (double-checked locking via `OnceLock`).
    pub fn global() -> &'static ThreadPoolRegistry {
        INSTANCE.get_or_init(|| {
            ThreadPoolRegistry {
                download_pool: NamedPool::build("vdm-download")
                    .expect("failed to build download_pool"),
                search_pool: NamedPool::build("vdm-search")
                    .expect("failed to build search_pool"),
                shut_down: AtomicBool::new(false),
            }
        })
    }

    pub fn download_pool(&self) -> Result<&NamedPool, PoolError> {
        self.guard(&self.download_pool)
    }

    pub fn search_pool(&self) -> Result<&NamedPool, PoolError> {
        self.guard(&self.search_pool)
    }

    fn guard<'a>(&self, pool: &'a NamedPool) -> Result<&'a NamedPool, PoolError> {
        if self.shut_down.load(Ordering::SeqCst) {
            Err(PoolError::ShutDown)
        } else {
            Ok(pool)
        }
    }

    /// Initiates non-blocking shutdown of both pools: no new work is
    /// accepted; in-flight tasks are expected to observe their own
    /// cancellation tokens and exit. Polls for termination and returns
    /// `true` if both pools drained to zero within `timeout`, `false`
    /// otherwise. Idempotent: a second call while already shut down
    /// returns immediately based on current pool occupancy.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.shut_down.store(true, Ordering::SeqCst);
        self.download_pool.stop_accepting();
        self.search_pool.stop_accepting();

        let deadline = Instant::now() + timeout;
        loop {
            let quiescent =
                self.download_pool.active_count() == 0 && self.search_pool.active_count() == 0;
            if quiescent {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }
    }
}
