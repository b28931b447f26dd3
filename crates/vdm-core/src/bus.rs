//! Event Bus: the only permitted conduit from background workers to the
//! single consumer thread that runs subscribers (e.g. a UI event loop).
//!
//! Producers call `publish` from any thread; it is non-blocking and
//! best-effort. Whichever thread owns the consumer's run loop is
//! responsible for calling `tick()` on its own schedule (e.g. every
//! 100ms); subscriber callbacks only ever run inside that call.

use std::collections::HashMap;
use std::panic::catch_unwind;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::model::{Event, EventKind, SubscriptionId};

/// Queue capacity. Publishing into a full queue fails with `Full` rather
/// than blocking.
pub const QUEUE_CAPACITY: usize = 1000;
/// Maximum events drained per `tick()`.
pub const DRAIN_BATCH: usize = 100;

/// Result of a `publish` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Full,
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Registry {
    listeners: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Listener)>>>,
}

impl Registry {
    fn new() -> Self {
        Self { listeners: RwLock::new(HashMap::new()) }
    }
}

/// Process-wide singleton delivering events to a single consumer thread.
pub struct EventBus {
    sender: Sender<Event>,
    receiver: Receiver<Event>,
    registry: Registry,
    next_subscription: AtomicU64,
    running: AtomicBool,
    started: AtomicBool,
}

static INSTANCE: OnceLock<EventBus> = OnceLock::new();

impl EventBus {
    fn new() -> Self {
        let (sender, receiver) = bounded(QUEUE_CAPACITY);
        Self {
            sender,
            receiver,
            registry: Registry::new(),
            next_subscription: AtomicU64::new(1),
            running: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    /// Process-wide singleton, lazily and race-free initialized.
    pub fn global() -> &'static EventBus {
        INSTANCE.get_or_init(EventBus::new)
    }

    /// Callable from any thread. Non-blocking. Returns `Full` (and drops
    /// the event) when the bounded queue has no free slot.
    pub fn publish(&self, event: Event) -> PublishOutcome {
        match self.sender.try_send(event) {
            Ok(()) => PublishOutcome::Delivered,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("event bus queue full, dropping event");
                PublishOutcome::Full
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("event bus queue disconnected");
                PublishOutcome::Full
            }
        }
    }

    /// Callable from any thread. The callback runs only on the thread that
    /// calls `tick()`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns `true` if a subscription with this id was found and removed.
    pub fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool {
        let mut listeners = self.registry.listeners.write();
        for subs in listeners.values_mut() {
            if let Some(pos) = subs.iter().position(|(id, _)| *id == subscription_id) {
                subs.remove(pos);
                return true;
            }
        }
        false
    }

    /// Must be called from the consumer thread exactly once. A second call
    /// is a no-op. Marks the bus active; the caller is responsible for
    /// calling `tick()` on a schedule from that same thread.
    pub fn start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            self.running.store(true, Ordering::SeqCst);
        }
    }

    /// Marks the bus inactive. The in-flight `tick()` call, if any,
    /// finishes its current batch; no further batch is drained after
    /// that. Clears whatever is left in the queue and returns how many
    /// events were discarded, so the caller can report it.
    pub fn stop(&self) -> usize {
        self.running.store(false, Ordering::SeqCst);
        self.clear_queue()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One drain tick: pull up to `DRAIN_BATCH` events off the head of the
    /// queue and invoke every live subscriber for each event's kind in
    /// subscription order. Must be called from the consumer thread.
    /// Returns the number of events processed.
    pub fn tick(&self) -> usize {
        if !self.running.load(Ordering::SeqCst) {
            return 0;
        }
        let mut processed = 0;
        for _ in 0..DRAIN_BATCH {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            self.dispatch(&event);
            processed += 1;
        }
        processed
    }

    fn dispatch(&self, event: &Event) {
        let subs: Vec<Listener> = {
            let listeners = self.registry.listeners.read();
            listeners
                .get(&event.kind())
                .map(|v| v.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default()
        };
        for callback in subs {
            let result = catch_unwind(std::panic::AssertUnwindSafe(|| callback(event)));
            if let Err(panic) = result {
                log_subscriber_panic(event.kind(), panic);
            }
        }
    }

    /// Number of events currently queued. For tests.
    pub fn queue_size(&self) -> usize {
        self.receiver.len()
    }

    /// Number of live listeners, optionally filtered by kind. For tests.
    pub fn listener_count(&self, kind: Option<EventKind>) -> usize {
        let listeners = self.registry.listeners.read();
        match kind {
            Some(k) => listeners.get(&k).map(|v| v.len()).unwrap_or(0),
            None => listeners.values().map(|v| v.len()).sum(),
        }
    }

    /// Drains and discards every queued event, returning the count cleared.
    pub fn clear_queue(&self) -> usize {
        let mut cleared = 0;
        while self.receiver.try_recv().is_ok() {
            cleared += 1;
        }
        cleared
    }
}

fn log_subscriber_panic(kind: EventKind, panic: Box<dyn std::any::Any + Send>) {
    let msg = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "subscriber panicked with non-string payload".to_string());
    tracing::error!(?kind, message = %msg, "subscriber callback panicked during dispatch");
}
