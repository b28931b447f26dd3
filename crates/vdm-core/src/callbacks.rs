//! Safe Callback Registry: tracks deferred UI-thread work per consumer and
//! cancels it on consumer teardown so late deliveries can't touch
//! destroyed state.
//!
//! This is the Rust replacement for an inherited "schedule on the UI
//! thread" mixin: a handle struct composed into whatever owns a consumer
//! integration (here, the CLI's drain loop), rather than a base class.
//! Every scheduled closure is delivered through a `crossbeam_channel` the
//! consumer drains on its own thread, alongside `EventBus::tick()`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

pub type CallbackHandle = u64;
/// Returned by `schedule_after`/`schedule_idle` when the consumer is
/// already torn down; scheduling such a handle is a documented no-op.
pub const INVALID_HANDLE: CallbackHandle = 0;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("scheduling attempted from thread {from:?}, expected consumer thread {expected:?}")]
    ThreadSafetyViolation { from: ThreadId, expected: ThreadId },
}

type BoxedFn = Box<dyn FnOnce() + Send>;

struct Shared {
    torn_down: AtomicBool,
    live_handles: Mutex<HashSet<CallbackHandle>>,
    next_handle: AtomicU64,
    sender: Sender<BoxedFn>,
}

/// A per-consumer registry of deferred callbacks. Create one per UI
/// object/consumer integration; call `cleanup_callbacks` when that
/// consumer is torn down.
pub struct SafeCallbackRegistry {
    shared: Arc<Shared>,
    receiver: Receiver<BoxedFn>,
    consumer_thread: Option<ThreadId>,
    strict: bool,
}

impl SafeCallbackRegistry {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            shared: Arc::new(Shared {
                torn_down: AtomicBool::new(false),
                live_handles: Mutex::new(HashSet::new()),
                next_handle: AtomicU64::new(1),
                sender,
            }),
            receiver,
            consumer_thread: None,
            strict: false,
        }
    }

    /// Enable debug strict mode: scheduling from a thread other than the
    /// one that called `bind_consumer_thread` raises
    /// `ThreadSafetyViolation` instead of silently posting.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Record the calling thread as the consumer thread. Call this once,
    /// from the thread that will later drain scheduled callbacks.
    pub fn bind_consumer_thread(&mut self) {
        self.consumer_thread = Some(std::thread::current().id());
    }

    fn check_thread(&self) -> Result<(), CallbackError> {
        if !self.strict {
            return Ok(());
        }
        if let Some(expected) = self.consumer_thread {
            let from = std::thread::current().id();
            if from != expected {
                return Err(CallbackError::ThreadSafetyViolation { from, expected });
            }
        }
        Ok(())
    }

    /// Enqueue `f` to run on the consumer thread after `delay`. Returns an
    /// opaque handle, or `INVALID_HANDLE` (doing nothing) if the consumer
    /// is already torn down.
    pub fn schedule_after(
        &self,
        delay: Duration,
        f: impl FnOnce() + Send + 'static,
    ) -> Result<CallbackHandle, CallbackError> {
        self.check_thread()?;
        if self.shared.torn_down.load(Ordering::SeqCst) {
            return Ok(INVALID_HANDLE);
        }
        let handle = self.shared.next_handle.fetch_add(1, Ordering::SeqCst);
        self.shared.live_handles.lock().unwrap().insert(handle);
        let shared = Arc::clone(&self.shared);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            deliver(&shared, handle, Box::new(f));
        });
        Ok(handle)
    }

    /// Enqueue `f` to run on the consumer thread at the next quiescent
    /// point (i.e. the next time it drains this registry). Same teardown
    /// semantics as `schedule_after`.
    pub fn schedule_idle(
        &self,
        f: impl FnOnce() + Send + 'static,
    ) -> Result<CallbackHandle, CallbackError> {
        self.check_thread()?;
        if self.shared.torn_down.load(Ordering::SeqCst) {
            return Ok(INVALID_HANDLE);
        }
        let handle = self.shared.next_handle.fetch_add(1, Ordering::SeqCst);
        self.shared.live_handles.lock().unwrap().insert(handle);
        deliver(&self.shared, handle, Box::new(f));
        Ok(handle)
    }

    /// Cancels every live handle and marks the consumer torn down.
    /// Subsequent scheduling is a no-op; already-delivered closures still
    /// sitting in the channel are drained and dropped without running.
    pub fn cleanup_callbacks(&self) {
        self.shared.torn_down.store(true, Ordering::SeqCst);
        self.shared.live_handles.lock().unwrap().clear();
        while self.receiver.try_recv().is_ok() {}
    }

    /// Drain and run every callback currently ready for delivery. Must be
    /// called from the consumer thread; wraps each closure so a panic
    /// (the "target was destroyed" category, or anything else) is
    /// absorbed rather than propagated to the consumer's run loop.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(f) = self.receiver.try_recv() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
            if let Err(panic) = result {
                log_callback_panic(panic);
            }
            ran += 1;
        }
        ran
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::SeqCst)
    }

    pub fn live_handle_count(&self) -> usize {
        self.shared.live_handles.lock().unwrap().len()
    }
}

impl Default for SafeCallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(shared: &Arc<Shared>, handle: CallbackHandle, f: BoxedFn) {
    if shared.torn_down.load(Ordering::SeqCst) {
        return;
    }
    let was_live = shared.live_handles.lock().unwrap().remove(&handle);
    if !was_live {
        // Cancelled between scheduling and firing.
        return;
    }
    let _ = shared.sender.send(f);
}

fn log_callback_panic(panic: Box<dyn std::any::Any + Send>) {
    let msg = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    if msg.to_lowercase().contains("destroyed") {
        tracing::debug!(message = %msg, "deferred callback target was destroyed");
    } else {
        tracing::error!(message = %msg, "deferred callback panicked");
    }
}
