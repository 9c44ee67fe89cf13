//! OpenSASE Helpdesk SLA Engine
//!
//! Deadline tracking, escalation and workflow automation for the
//! self-hosted support platform.
//!
//! ## Architecture
//!
//! - **Domain Layer**: Ticket aggregate, SLA policy, workflow rule model, domain events
//! - **Application Layer**: Ticket service, SLA monitor, escalation policy, workflow engine, scheduler
//! - **Ports Layer**: Ticket store, notifier, directory and clock interfaces
//! - **Infrastructure Layer**: In-memory adapters used by the daemon and tests
//!
//! ## Cadences
//!
//! | Task | Default period | Entry point |
//! |------|----------------|-------------|
//! | SLA warning / breach scan | 15 min | [`SlaMonitor::check_sla_status`] |
//! | Escalation scan | 60 min | [`SlaMonitor::check_escalations`] |
//! | Scheduled workflow sweep | 24 h | [`WorkflowEngine::sweep`] |
//!
//! All mutations go through the ticket store with an expected version. A
//! writer that loses the race skips the ticket for the current cycle; the
//! next tick re-evaluates it.

use thiserror::Error;

pub mod config;
pub mod domain;
pub mod application;
pub mod ports;
pub mod infrastructure;

pub use config::HelpdeskConfig;
pub use domain::aggregates::{Ticket, TicketSla, InternalNote, User};
pub use domain::value_objects::{TicketId, UserId, Priority, TicketStatus, Role, Actor, NoteAuthor};
pub use domain::sla::{SlaPolicy, SlaStatus};
pub use domain::rules::{Rule, Condition, Operator, TicketField, Action, AgentTarget, NotifyTarget, Trigger};
pub use domain::notification::{Notification, NotificationKind};
pub use domain::events::TicketEvent;
pub use application::{
    Helpdesk, HelpdeskAdapters, TicketService, SlaMonitor, EscalationPolicy, WorkflowEngine,
    NotificationDispatcher, Scheduler, SchedulerHandle,
};
pub use ports::inbound::TicketUseCases;
pub use ports::outbound::{
    TicketRepository, TicketFilter, Notifier, NotificationLog, Directory, Clock,
    AgentSelector, RepositoryError, NotificationError,
};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum HelpdeskError {
    #[error("version conflict on ticket {ticket_id}: expected {expected}, found {actual}")]
    VersionConflict {
        ticket_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<RepositoryError> for HelpdeskError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            RepositoryError::VersionConflict { ticket_id, expected, actual } => {
                Self::VersionConflict { ticket_id, expected, actual }
            }
            other => Self::Repository(other.to_string()),
        }
    }
}

impl HelpdeskError {
    /// Whether a scheduled writer should skip the ticket until the next tick.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, HelpdeskError>;

/// A workflow rule whose actions failed; logged and collected, never propagated.
#[derive(Error, Debug)]
#[error("rule '{rule}' failed: {source}")]
pub struct RuleEvaluationError {
    pub rule: String,
    #[source]
    pub source: HelpdeskError,
}

/// A single ticket failed inside a monitor scan; the scan continues.
#[derive(Error, Debug)]
#[error("{stage} failed for ticket {ticket_id}: {source}")]
pub struct ScanIterationError {
    pub ticket_id: TicketId,
    pub stage: &'static str,
    #[source]
    pub source: HelpdeskError,
}
