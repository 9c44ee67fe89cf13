//! Outbound ports
//!
//! Hexagonal architecture: collaborators the engine depends on but does not
//! own. The ticket store, notification delivery, user directory and clock
//! all live behind these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::aggregates::{Ticket, User};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::value_objects::{TicketId, TicketStatus, UserId};

/// Ticket query understood by every store adapter.
///
/// Empty lists and `None` bounds do not constrain the result.
#[derive(Clone, Debug, Default)]
pub struct TicketFilter {
    pub statuses: Vec<TicketStatus>,
    /// Inclusive lower bound on the due date.
    pub due_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the due date.
    pub due_until: Option<DateTime<Utc>>,
    /// Strict upper bound on the due date.
    pub due_before: Option<DateTime<Utc>>,
}

impl TicketFilter {
    pub fn active() -> Self {
        Self::default().with_statuses(&[TicketStatus::Open, TicketStatus::InProgress])
    }

    pub fn with_statuses(mut self, statuses: &[TicketStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn due_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.due_from = Some(from);
        self.due_until = Some(until);
        self
    }

    pub fn overdue_at(mut self, now: DateTime<Utc>) -> Self {
        self.due_before = Some(now);
        self
    }

    /// Reference semantics for adapters that filter in memory.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        let due = ticket.due_date();
        (self.statuses.is_empty() || self.statuses.contains(&ticket.status()))
            && self.due_from.map_or(true, |from| due >= from)
            && self.due_until.map_or(true, |until| due <= until)
            && self.due_before.map_or(true, |before| due < before)
    }
}

/// Ticket store port
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Find tickets matching a filter, oldest first
    async fn find_matching(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, RepositoryError>;

    /// Find ticket by ID
    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, RepositoryError>;

    /// Insert a freshly created ticket at version 0
    async fn insert(&self, ticket: &Ticket) -> Result<Ticket, RepositoryError>;

    /// Atomically replace the stored ticket if its version still equals
    /// `expected_version`; the stored copy comes back with the next version.
    async fn save(&self, ticket: &Ticket, expected_version: u64) -> Result<Ticket, RepositoryError>;
}

/// Notification delivery port. Callers contain every error it returns.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Record of fired SLA notifications, used for de-duplication windows.
#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn last_sent(
        &self,
        ticket_id: &TicketId,
        kind: NotificationKind,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    async fn record(
        &self,
        ticket_id: &TicketId,
        kind: NotificationKind,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// User directory port
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_active_agents_by_specialization(&self, tag: &str) -> Result<Vec<User>, RepositoryError>;

    async fn find_active_admins(&self) -> Result<Vec<User>, RepositoryError>;

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
}

/// Wall-clock source; all deadline math reads "now" from here.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Picks one agent out of a candidate list.
pub trait AgentSelector: Send + Sync {
    fn select(&self, candidates: &[User]) -> Option<UserId>;
}

/// Repository error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("version conflict on {ticket_id}: expected {expected}, found {actual}")]
    VersionConflict {
        ticket_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),
}
