//! Helpdesk domain events
//!
//! Raised by the ticket aggregate; the ticket service maps them to
//! workflow triggers after a successful save.

use chrono::{DateTime, Utc};

use crate::domain::rules::Trigger;
use crate::domain::value_objects::{Priority, TicketId, TicketStatus, UserId};

#[derive(Clone, Debug, PartialEq)]
pub enum TicketEvent {
    Created {
        ticket_id: TicketId,
        priority: Priority,
        created_at: DateTime<Utc>,
    },

    StatusChanged {
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
        changed_at: DateTime<Utc>,
    },

    PriorityChanged {
        ticket_id: TicketId,
        from: Priority,
        to: Priority,
        changed_at: DateTime<Utc>,
    },

    Assigned {
        ticket_id: TicketId,
        from: Option<UserId>,
        to: UserId,
        assigned_at: DateTime<Utc>,
    },

    CategoryChanged {
        ticket_id: TicketId,
        category: String,
    },

    TagAdded {
        ticket_id: TicketId,
        tag: String,
    },

    NoteAdded {
        ticket_id: TicketId,
    },

    Escalated {
        ticket_id: TicketId,
        reason: String,
        escalated_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    /// Workflow triggers this event fires, beyond the generic `ticket_updated`.
    pub fn triggers(&self) -> Vec<Trigger> {
        match self {
            Self::Created { .. } => vec![Trigger::TicketCreated],
            Self::StatusChanged { to: TicketStatus::Resolved, .. } => {
                vec![Trigger::StatusChanged, Trigger::TicketResolved]
            }
            Self::StatusChanged { .. } => vec![Trigger::StatusChanged],
            Self::PriorityChanged { .. } => vec![Trigger::PriorityChanged],
            Self::Assigned { .. } => vec![Trigger::TicketAssigned],
            Self::Escalated { .. } => vec![Trigger::TicketEscalated],
            Self::CategoryChanged { .. } | Self::TagAdded { .. } | Self::NoteAdded { .. } => vec![],
        }
    }
}
