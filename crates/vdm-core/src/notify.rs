//! `NotificationDelivery`: the external desktop-notification collaborator.
//! Best-effort, never blocking; failures are logged and swallowed by
//! callers, never propagated into the orchestration core.

/// A desktop notification sink. Implementations must not block the
/// caller for longer than a user would tolerate inside an event
/// subscriber callback.
pub trait NotificationDelivery: Send + Sync {
    fn notify(&self, summary: &str, body: &str);
}

/// A `NotificationDelivery` that drops every notification. Useful as a
/// default when no concrete notifier is wired up (e.g. in tests or a
/// headless run).
pub struct NullNotificationDelivery;

impl NotificationDelivery for NullNotificationDelivery {
    fn notify(&self, summary: &str, body: &str) {
        tracing::debug!(summary, body, "notification suppressed (null delivery)");
    }
}
