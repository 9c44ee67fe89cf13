//! Fire-and-forget notification dispatch
//!
//! Each delivery runs on its own task with a timeout, so a slow notifier
//! never holds up the scan that produced the notification. Failures are
//! logged here and never reach the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::domain::notification::Notification;
use crate::ports::outbound::{NotificationError, Notifier};

#[derive(Default)]
struct DispatchStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<DispatchStats>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self {
            notifier,
            timeout,
            in_flight: Mutex::new(Vec::new()),
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        let stats = self.stats.clone();
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, notifier.notify(&notification)).await {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Timeout(timeout)),
            };

            match result {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        recipient = %notification.recipient,
                        kind = ?notification.kind,
                        "notification delivered"
                    );
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        recipient = %notification.recipient,
                        kind = ?notification.kind,
                        error = %e,
                        "notification delivery failed"
                    );
                }
            }
        });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    pub fn dispatch_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for n in notifications {
            self.dispatch(n);
        }
    }

    /// Wait for every outstanding delivery; each is bounded by the timeout.
    pub async fn settle(&self) {
        let handles = std::mem::take(&mut *self.in_flight.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "notification task aborted");
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.stats.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }
}
