//! Outbound notification record
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Priority, TicketId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SlaWarning,
    SlaBreach,
    TicketEscalated,
    TicketAssigned,
    WorkflowNotification,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_ticket_id: Option<TicketId>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient,
            kind,
            title: title.into(),
            message: message.into(),
            related_ticket_id: None,
            priority: Priority::Medium,
            created_at,
        }
    }

    pub fn for_ticket(mut self, ticket_id: TicketId, priority: Priority) -> Self {
        self.related_ticket_id = Some(ticket_id);
        self.priority = priority;
        self
    }
}
