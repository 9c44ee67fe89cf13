//! SLA policy and status classification
//!
//! Budgets are keyed by priority. Due dates are always measured from the
//! ticket's creation time, so a priority change never buys extra time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Priority, TicketStatus};

/// Derived SLA state of a ticket at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    OnTime,
    Warning,
    ResponseBreach,
    ResolutionBreach,
    Completed,
}

impl SlaStatus {
    pub fn is_breached(&self) -> bool {
        matches!(self, Self::ResponseBreach | Self::ResolutionBreach)
    }
}

#[derive(Clone, Debug)]
pub struct SlaPolicy {
    /// How long before the due date a ticket is reported as `warning`.
    pub warning_lead: Duration,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self { warning_lead: Duration::hours(24) }
    }
}

impl SlaPolicy {
    pub fn new(warning_lead: Duration) -> Self {
        Self { warning_lead }
    }

    pub fn resolution_hours(priority: Priority) -> i64 {
        match priority {
            Priority::Urgent => 2,
            Priority::High => 8,
            Priority::Medium => 24,
            Priority::Low => 72,
        }
    }

    pub fn response_hours(priority: Priority) -> i64 {
        match priority {
            Priority::Urgent => 1,
            Priority::High => 4,
            Priority::Medium => 8,
            Priority::Low => 24,
        }
    }

    pub fn resolution_budget(priority: Priority) -> Duration {
        Duration::hours(Self::resolution_hours(priority))
    }

    pub fn response_budget(priority: Priority) -> Duration {
        Duration::hours(Self::response_hours(priority))
    }

    /// `created_at` must be the ticket's original creation time.
    pub fn due_date(priority: Priority, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Self::resolution_budget(priority)
    }

    /// Priority-ordered classifier; the first matching rule wins.
    pub fn classify(
        &self,
        now: DateTime<Utc>,
        status: TicketStatus,
        due_date: DateTime<Utc>,
        first_response_at: Option<DateTime<Utc>>,
        response_budget: Duration,
    ) -> SlaStatus {
        if status.is_sla_complete() {
            return SlaStatus::Completed;
        }
        if let Some(responded) = first_response_at {
            if now > responded + response_budget {
                return SlaStatus::ResponseBreach;
            }
        }
        if now > due_date {
            return SlaStatus::ResolutionBreach;
        }
        if now > due_date - self.warning_lead {
            return SlaStatus::Warning;
        }
        SlaStatus::OnTime
    }
}

/// Whole hours left until `due_date`, floored at zero.
pub fn hours_remaining(now: DateTime<Utc>, due_date: DateTime<Utc>) -> i64 {
    (due_date - now).num_hours().max(0)
}
