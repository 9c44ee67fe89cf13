//! Data Transfer Objects
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::Ticket;
use crate::domain::sla::{SlaPolicy, SlaStatus};
use crate::domain::value_objects::{Priority, TicketId, TicketStatus, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketCommand {
    pub title: String,
    pub created_by: UserId,
    pub category: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTicketCommand {
    pub ticket_id: TicketId,
    pub expected_version: u64,
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub add_tags: Vec<String>,
}

impl UpdateTicketCommand {
    pub fn new(ticket_id: TicketId, expected_version: u64) -> Self {
        Self { ticket_id, expected_version, ..Default::default() }
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn assign(mut self, agent: UserId) -> Self {
        self.assigned_to = Some(agent);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tags.push(tag.into());
        self
    }
}

/// Ticket plus the SLA fields derived at read time.
#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    pub ticket: Ticket,
    pub sla_status: SlaStatus,
    pub time_remaining_hours: Option<i64>,
}

impl TicketView {
    pub fn at(ticket: Ticket, policy: &SlaPolicy, now: DateTime<Utc>) -> Self {
        Self {
            sla_status: ticket.sla_status(policy, now),
            time_remaining_hours: ticket.time_remaining_hours(now),
            ticket,
        }
    }
}

/// Aggregate SLA counts for dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaStats {
    pub total: u64,
    pub on_time: u64,
    pub warning: u64,
    pub response_breach: u64,
    pub resolution_breach: u64,
    pub completed: u64,
    /// Percentage of tracked (non-completed) tickets that are not breached.
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlaScanReport {
    pub warnings_sent: u64,
    pub breaches_sent: u64,
    pub escalated: u64,
    pub conflicts: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EscalationReport {
    pub examined: u64,
    pub escalated: u64,
    pub conflicts: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub examined: u64,
    pub rules_fired: u64,
    pub rule_failures: u64,
}
