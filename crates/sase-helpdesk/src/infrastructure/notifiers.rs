//! Notifier adapters

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::notification::{Notification, NotificationKind};
use crate::ports::outbound::{NotificationError, Notifier};

/// Emits each notification as a structured log line.
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            ticket_id = notification.related_ticket_id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            priority = %notification.priority,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Keeps every delivered notification in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn sent_of(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent.lock().iter().filter(|n| n.kind == kind).cloned().collect()
    }

    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent.lock().iter().filter(|n| n.kind == kind).count()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
