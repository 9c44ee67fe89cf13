//! Ticket Aggregate
//!
//! Field-level mutations live here; they never touch `version`. The
//! version is stamped by the ticket store when a mutated copy is saved
//! against the version the writer read, so one save is one increment no
//! matter how many fields changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::TicketEvent;
use crate::domain::sla::{hours_remaining, SlaPolicy, SlaStatus};
use crate::domain::value_objects::{NoteAuthor, Priority, Role, TicketId, TicketStatus, UserId};
use crate::HelpdeskError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketSla {
    pub response_time_hours: i64,
    pub resolution_time_hours: i64,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub due_date: DateTime<Utc>,
}

impl TicketSla {
    fn for_priority(priority: Priority, created_at: DateTime<Utc>) -> Self {
        Self {
            response_time_hours: SlaPolicy::response_hours(priority),
            resolution_time_hours: SlaPolicy::resolution_hours(priority),
            first_response_at: None,
            resolved_at: None,
            due_date: SlaPolicy::due_date(priority, created_at),
        }
    }
}

/// Audit entry visible to agents and admins only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InternalNote {
    pub text: String,
    pub author: NoteAuthor,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    title: String,
    created_by: UserId,
    status: TicketStatus,
    priority: Priority,
    category: String,
    assigned_to: Option<UserId>,
    tags: Vec<String>,
    sla: TicketSla,
    version: u64,
    internal_notes: Vec<InternalNote>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<TicketEvent>,
}

impl Ticket {
    pub fn create(
        title: impl Into<String>,
        created_by: UserId,
        category: impl Into<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = TicketId::new();
        let mut t = Self {
            id: id.clone(),
            title: title.into(),
            created_by,
            status: TicketStatus::Open,
            priority,
            category: category.into(),
            assigned_to: None,
            tags: vec![],
            sla: TicketSla::for_priority(priority, created_at),
            version: 0,
            internal_notes: vec![],
            created_at,
            updated_at: created_at,
            events: vec![],
        };
        t.raise_event(TicketEvent::Created { ticket_id: id, priority, created_at });
        t
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> &TicketId { &self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn created_by(&self) -> &UserId { &self.created_by }
    pub fn status(&self) -> TicketStatus { self.status }
    pub fn priority(&self) -> Priority { self.priority }
    pub fn category(&self) -> &str { &self.category }
    pub fn assigned_to(&self) -> Option<&UserId> { self.assigned_to.as_ref() }
    pub fn tags(&self) -> &[String] { &self.tags }
    pub fn sla(&self) -> &TicketSla { &self.sla }
    pub fn due_date(&self) -> DateTime<Utc> { self.sla.due_date }
    pub fn version(&self) -> u64 { self.version }
    pub fn internal_notes(&self) -> &[InternalNote] { &self.internal_notes }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    // =========================================================================
    // Derived SLA view
    // =========================================================================

    pub fn sla_status(&self, policy: &SlaPolicy, now: DateTime<Utc>) -> SlaStatus {
        policy.classify(
            now,
            self.status,
            self.sla.due_date,
            self.sla.first_response_at,
            chrono::Duration::hours(self.sla.response_time_hours),
        )
    }

    /// Whole hours until the due date; `None` once SLA tracking has stopped.
    pub fn time_remaining_hours(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.status.is_sla_complete() {
            return None;
        }
        Some(hours_remaining(now, self.sla.due_date))
    }

    // =========================================================================
    // Authorization
    // =========================================================================

    pub fn can_be_modified(&self, role: Role, actor_id: &UserId) -> bool {
        match role {
            Role::Admin => true,
            Role::Agent => self.assigned_to.as_ref().map_or(true, |a| a == actor_id),
            Role::Customer => &self.created_by == actor_id && self.status == TicketStatus::Open,
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Returns `Ok(false)` when the ticket is already in `to`.
    pub fn change_status(&mut self, to: TicketStatus, at: DateTime<Utc>) -> Result<bool, HelpdeskError> {
        let from = self.status;
        if from == to {
            return Ok(false);
        }
        if from == TicketStatus::Cancelled || (to == TicketStatus::Cancelled && from.is_terminal()) {
            return Err(HelpdeskError::InvalidTransition { from, to });
        }

        self.status = to;
        if self.sla.first_response_at.is_none() {
            self.sla.first_response_at = Some(at);
        }
        if matches!(to, TicketStatus::Resolved | TicketStatus::Closed) && self.sla.resolved_at.is_none() {
            self.sla.resolved_at = Some(at);
        }
        self.touch(at);
        self.raise_event(TicketEvent::StatusChanged {
            ticket_id: self.id.clone(),
            from,
            to,
            changed_at: at,
        });
        Ok(true)
    }

    /// Recomputes budgets and the due date from the creation time.
    pub fn change_priority(&mut self, to: Priority, at: DateTime<Utc>) -> bool {
        let from = self.priority;
        if from == to {
            return false;
        }

        self.priority = to;
        self.sla.response_time_hours = SlaPolicy::response_hours(to);
        self.sla.resolution_time_hours = SlaPolicy::resolution_hours(to);
        self.sla.due_date = SlaPolicy::due_date(to, self.created_at);
        self.touch(at);
        self.raise_event(TicketEvent::PriorityChanged {
            ticket_id: self.id.clone(),
            from,
            to,
            changed_at: at,
        });
        true
    }

    pub fn assign(&mut self, agent: UserId, at: DateTime<Utc>) -> bool {
        if self.assigned_to.as_ref() == Some(&agent) {
            return false;
        }

        let from = self.assigned_to.replace(agent.clone());
        self.touch(at);
        self.raise_event(TicketEvent::Assigned {
            ticket_id: self.id.clone(),
            from,
            to: agent,
            assigned_at: at,
        });
        true
    }

    pub fn set_category(&mut self, category: impl Into<String>, at: DateTime<Utc>) -> bool {
        let category = category.into();
        if self.category == category {
            return false;
        }

        self.category = category.clone();
        self.touch(at);
        self.raise_event(TicketEvent::CategoryChanged { ticket_id: self.id.clone(), category });
        true
    }

    /// Idempotent; a tag already present is not added twice.
    pub fn add_tag(&mut self, tag: impl Into<String>, at: DateTime<Utc>) -> bool {
        let tag = tag.into();
        if self.tags.contains(&tag) {
            return false;
        }

        self.tags.push(tag.clone());
        self.touch(at);
        self.raise_event(TicketEvent::TagAdded { ticket_id: self.id.clone(), tag });
        true
    }

    pub fn add_internal_note(&mut self, text: impl Into<String>, author: NoteAuthor, at: DateTime<Utc>) {
        self.internal_notes.push(InternalNote { text: text.into(), author, created_at: at });
        self.touch(at);
        self.raise_event(TicketEvent::NoteAdded { ticket_id: self.id.clone() });
    }

    /// Forces priority to urgent (no-op if already urgent) and appends a
    /// system note. The note is written on every call.
    pub fn escalate(&mut self, reason: &str, at: DateTime<Utc>) {
        self.change_priority(Priority::Urgent, at);
        self.add_internal_note(format!("Ticket auto-escalated: {}", reason), NoteAuthor::System, at);
        self.raise_event(TicketEvent::Escalated {
            ticket_id: self.id.clone(),
            reason: reason.to_string(),
            escalated_at: at,
        });
    }

    // =========================================================================
    // Persistence support
    // =========================================================================

    /// The stored form of this ticket after a save against `expected_version`.
    pub fn committed(mut self, expected_version: u64) -> Self {
        self.version = expected_version + 1;
        self.events.clear();
        self
    }

    pub fn take_events(&mut self) -> Vec<TicketEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[TicketEvent] {
        &self.events
    }

    fn raise_event(&mut self, e: TicketEvent) {
        self.events.push(e);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn ticket() -> Ticket {
        Ticket::create("Printer on fire", UserId::from_string("cust-1"), "technical", Priority::Medium, t0())
    }

    #[test]
    fn test_create_defaults() {
        let t = ticket();
        assert_eq!(t.status(), TicketStatus::Open);
        assert_eq!(t.version(), 0);
        assert_eq!(t.due_date(), t0() + Duration::hours(24));
        assert!(t.sla().first_response_at.is_none());
        assert_eq!(t.pending_events().len(), 1);
    }

    #[test]
    fn test_priority_change_keeps_creation_anchor() {
        let mut t = ticket();
        let later = t0() + Duration::hours(5);
        assert!(t.change_priority(Priority::Urgent, later));
        assert_eq!(t.due_date(), t0() + Duration::hours(2));
        assert_eq!(t.sla().resolution_time_hours, 2);
        assert_eq!(t.updated_at(), later);
        assert!(!t.change_priority(Priority::Urgent, later));
    }

    #[test]
    fn test_first_response_set_once() {
        let mut t = ticket();
        let first = t0() + Duration::hours(1);
        t.change_status(TicketStatus::InProgress, first).unwrap();
        t.change_status(TicketStatus::Resolved, first + Duration::hours(2)).unwrap();
        assert_eq!(t.sla().first_response_at, Some(first));
        assert_eq!(t.sla().resolved_at, Some(first + Duration::hours(2)));

        t.change_status(TicketStatus::InProgress, first + Duration::hours(3)).unwrap();
        t.change_status(TicketStatus::Closed, first + Duration::hours(4)).unwrap();
        assert_eq!(t.sla().first_response_at, Some(first));
        assert_eq!(t.sla().resolved_at, Some(first + Duration::hours(2)));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut t = ticket();
        t.change_status(TicketStatus::Cancelled, t0()).unwrap();
        let err = t.change_status(TicketStatus::Open, t0()).unwrap_err();
        assert!(matches!(err, HelpdeskError::InvalidTransition { .. }));

        let mut closed = ticket();
        closed.change_status(TicketStatus::Closed, t0()).unwrap();
        assert!(closed.change_status(TicketStatus::Cancelled, t0()).is_err());
    }

    #[test]
    fn test_add_tag_idempotent() {
        let mut t = ticket();
        assert!(t.add_tag("vip", t0()));
        assert!(!t.add_tag("vip", t0()));
        assert_eq!(t.tags(), ["vip".to_string()]);
    }

    #[test]
    fn test_escalate_writes_system_note() {
        let mut t = ticket();
        t.escalate("unassigned for 25 hours", t0());
        t.escalate("unassigned for 26 hours", t0());
        assert_eq!(t.priority(), Priority::Urgent);
        assert_eq!(t.internal_notes().len(), 2);
        assert_eq!(t.internal_notes()[0].author, NoteAuthor::System);
    }

    #[test]
    fn test_can_be_modified() {
        let mut t = ticket();
        let customer = UserId::from_string("cust-1");
        let agent = UserId::from_string("agent-1");
        let other = UserId::from_string("agent-2");

        assert!(t.can_be_modified(Role::Admin, &other));
        assert!(t.can_be_modified(Role::Agent, &agent));
        assert!(t.can_be_modified(Role::Customer, &customer));

        t.assign(agent.clone(), t0());
        assert!(t.can_be_modified(Role::Agent, &agent));
        assert!(!t.can_be_modified(Role::Agent, &other));

        t.change_status(TicketStatus::InProgress, t0()).unwrap();
        assert!(!t.can_be_modified(Role::Customer, &customer));
    }

    #[test]
    fn test_time_remaining() {
        let mut t = ticket();
        assert_eq!(t.time_remaining_hours(t0() + Duration::minutes(90)), Some(22));
        assert_eq!(t.time_remaining_hours(t0() + Duration::hours(30)), Some(0));
        t.change_status(TicketStatus::Closed, t0()).unwrap();
        assert_eq!(t.time_remaining_hours(t0()), None);
    }

    #[test]
    fn test_committed_increments_version() {
        let t = ticket();
        let stored = t.committed(0);
        assert_eq!(stored.version(), 1);
        assert!(stored.pending_events().is_empty());
    }
}
