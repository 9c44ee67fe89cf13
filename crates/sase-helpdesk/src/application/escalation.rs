//! Escalation Policy
//!
//! Neglect detection on the hourly tick, plus the escalation action shared
//! with the SLA breach path.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::application::dispatcher::NotificationDispatcher;
use crate::application::dto::EscalationReport;
use crate::application::workflow::WorkflowEngine;
use crate::config::HelpdeskConfig;
use crate::domain::aggregates::Ticket;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::rules::Trigger;
use crate::domain::value_objects::{Actor, Priority, TicketStatus};
use crate::ports::outbound::{Clock, Directory, TicketFilter, TicketRepository};
use crate::{Result, ScanIterationError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscalationReason {
    Unassigned { hours: i64 },
    StaleHighPriority { priority: Priority, hours: i64 },
    SlaBreach,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned { hours } => write!(f, "unassigned for {} hours", hours),
            Self::StaleHighPriority { priority, hours } => {
                write!(f, "{} priority ticket without update for {} hours", priority, hours)
            }
            Self::SlaBreach => write!(f, "SLA breached"),
        }
    }
}

pub struct EscalationPolicy {
    tickets: Arc<dyn TicketRepository>,
    directory: Arc<dyn Directory>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    workflow: Option<Arc<WorkflowEngine>>,
    unassigned_stale: Duration,
    high_priority_stale: Duration,
}

impl EscalationPolicy {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        directory: Arc<dyn Directory>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: &HelpdeskConfig,
    ) -> Self {
        Self {
            tickets,
            directory,
            dispatcher,
            clock,
            workflow: None,
            unassigned_stale: config.unassigned_stale(),
            high_priority_stale: config.high_priority_stale(),
        }
    }

    /// Run `ticket_escalated` rules after each successful escalation.
    pub fn with_workflow(mut self, workflow: Arc<WorkflowEngine>) -> Self {
        self.workflow = Some(workflow);
        self
    }

    /// First neglect criterion the ticket meets at `now`, if any.
    pub fn criteria(&self, ticket: &Ticket, now: DateTime<Utc>) -> Option<EscalationReason> {
        let age = now - ticket.created_at();
        if ticket.status() == TicketStatus::Open && ticket.assigned_to().is_none() && age > self.unassigned_stale {
            return Some(EscalationReason::Unassigned { hours: age.num_hours() });
        }

        let idle = now - ticket.updated_at();
        if ticket.status().is_active()
            && matches!(ticket.priority(), Priority::High | Priority::Urgent)
            && idle > self.high_priority_stale
        {
            return Some(EscalationReason::StaleHighPriority {
                priority: ticket.priority(),
                hours: idle.num_hours(),
            });
        }

        None
    }

    /// Forces urgent priority, writes the system note and saves against the
    /// version in `ticket`. Admins are resolved before the save and notified
    /// only when it lands.
    pub async fn escalate(&self, ticket: &Ticket, reason: &EscalationReason) -> Result<Ticket> {
        let now = self.clock.now();
        let reason_text = reason.to_string();

        let admins = self.directory.find_active_admins().await?;

        let mut working = ticket.clone();
        working.escalate(&reason_text, now);
        working.take_events();
        let saved = self.tickets.save(&working, ticket.version()).await?;

        tracing::info!(
            ticket_id = %saved.id(),
            reason = %reason_text,
            version = saved.version(),
            "ticket escalated"
        );

        self.dispatcher.dispatch_all(admins.into_iter().map(|admin| {
            Notification::new(
                admin.id,
                NotificationKind::TicketEscalated,
                "Ticket escalated",
                format!("Ticket \"{}\" was escalated: {}", saved.title(), reason_text),
                now,
            )
            .for_ticket(saved.id().clone(), saved.priority())
        }));

        match &self.workflow {
            Some(workflow) => {
                let outcome = workflow.execute_rules(&saved, Trigger::TicketEscalated, &Actor::System).await;
                Ok(outcome.ticket)
            }
            None => Ok(saved),
        }
    }

    /// Hourly pass: every active ticket meeting either criterion is
    /// escalated once.
    pub async fn scan(&self) -> EscalationReport {
        let now = self.clock.now();
        let mut report = EscalationReport::default();

        let candidates = match self.tickets.find_matching(&TicketFilter::active()).await {
            Ok(tickets) => tickets,
            Err(e) => {
                tracing::error!(error = %e, "escalation scan query failed");
                report.failures += 1;
                return report;
            }
        };

        for ticket in candidates {
            report.examined += 1;
            let Some(reason) = self.criteria(&ticket, now) else {
                continue;
            };

            match self.escalate(&ticket, &reason).await {
                Ok(_) => report.escalated += 1,
                Err(e) if e.is_conflict() => {
                    tracing::warn!(ticket_id = %ticket.id(), error = %e, "escalation lost version race, skipping");
                    report.conflicts += 1;
                }
                Err(source) => {
                    let err = ScanIterationError { ticket_id: ticket.id().clone(), stage: "escalation", source };
                    tracing::error!(error = %err, "escalation scan iteration failed");
                    report.failures += 1;
                }
            }
        }

        self.dispatcher.settle().await;
        tracing::debug!(?report, "escalation scan complete");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::User;
    use crate::domain::value_objects::{Role, UserId};
    use crate::infrastructure::{InMemoryDirectory, InMemoryTicketRepository, ManualClock, RecordingNotifier};
    use crate::ports::outbound::RepositoryError;
    use async_trait::async_trait;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z").unwrap().with_timezone(&Utc)
    }

    struct Fixture {
        policy: EscalationPolicy,
        tickets: Arc<InMemoryTicketRepository>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let tickets = Arc::new(InMemoryTicketRepository::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(notifier.clone(), std::time::Duration::from_secs(1)));
        let clock = Arc::new(ManualClock::new(t0()));
        let directory = Arc::new(InMemoryDirectory::with_users(vec![
            User::new("admin-1", "Ada", Role::Admin),
            User::new("admin-2", "Bo", Role::Admin),
        ]));
        let policy = EscalationPolicy::new(
            tickets.clone(),
            directory,
            dispatcher,
            clock.clone(),
            &HelpdeskConfig::default(),
        );
        Fixture { policy, tickets, notifier, clock }
    }

    fn ticket(priority: Priority) -> Ticket {
        Ticket::create("Printer on fire", UserId::from_string("cust-1"), "general", priority, t0())
    }

    #[test]
    fn test_criteria() {
        let f = fixture();
        let open = ticket(Priority::Low);
        assert_eq!(f.policy.criteria(&open, t0() + Duration::hours(24)), None);
        assert_eq!(
            f.policy.criteria(&open, t0() + Duration::hours(25)),
            Some(EscalationReason::Unassigned { hours: 25 })
        );

        let mut assigned = ticket(Priority::Low);
        assigned.assign(UserId::from_string("agent-1"), t0());
        assert_eq!(f.policy.criteria(&assigned, t0() + Duration::hours(30)), None);

        let high = ticket(Priority::High);
        assert_eq!(
            f.policy.criteria(&high, t0() + Duration::hours(5)),
            Some(EscalationReason::StaleHighPriority { priority: Priority::High, hours: 5 })
        );

        let mut working = ticket(Priority::Medium);
        working.change_status(TicketStatus::InProgress, t0()).unwrap();
        assert_eq!(f.policy.criteria(&working, t0() + Duration::hours(48)), None);
    }

    #[tokio::test]
    async fn test_scan_escalates_stale_unassigned() {
        let f = fixture();
        let stored = f.tickets.insert(&ticket(Priority::Low)).await.unwrap();
        f.clock.set(t0() + Duration::hours(25));

        let report = f.policy.scan().await;
        assert_eq!(report.escalated, 1);

        let after = f.tickets.get(stored.id()).await.unwrap().unwrap();
        assert_eq!(after.priority(), Priority::Urgent);
        assert_eq!(after.version(), 1);
        assert_eq!(after.internal_notes().len(), 1);
        assert_eq!(after.internal_notes()[0].text, "Ticket auto-escalated: unassigned for 25 hours");
        assert_eq!(f.notifier.count_of(NotificationKind::TicketEscalated), 2);
    }

    #[tokio::test]
    async fn test_repeat_ticks_nag_again() {
        let f = fixture();
        let stored = f.tickets.insert(&ticket(Priority::Low)).await.unwrap();

        f.clock.set(t0() + Duration::hours(25));
        f.policy.scan().await;
        f.clock.set(t0() + Duration::hours(26));
        f.policy.scan().await;

        let after = f.tickets.get(stored.id()).await.unwrap().unwrap();
        assert_eq!(after.internal_notes().len(), 2);
        assert_eq!(after.version(), 2);
        assert_eq!(f.notifier.count_of(NotificationKind::TicketEscalated), 4);
    }

    struct RacingRepository {
        inner: InMemoryTicketRepository,
    }

    #[async_trait]
    impl TicketRepository for RacingRepository {
        async fn find_matching(&self, filter: &TicketFilter) -> std::result::Result<Vec<Ticket>, RepositoryError> {
            self.inner.find_matching(filter).await
        }

        async fn get(&self, id: &crate::TicketId) -> std::result::Result<Option<Ticket>, RepositoryError> {
            self.inner.get(id).await
        }

        async fn insert(&self, ticket: &Ticket) -> std::result::Result<Ticket, RepositoryError> {
            self.inner.insert(ticket).await
        }

        async fn save(&self, ticket: &Ticket, expected: u64) -> std::result::Result<Ticket, RepositoryError> {
            Err(RepositoryError::VersionConflict {
                ticket_id: ticket.id().to_string(),
                expected,
                actual: expected + 1,
            })
        }
    }

    #[tokio::test]
    async fn test_conflict_skips_ticket_without_notifying() {
        let repo = Arc::new(RacingRepository { inner: InMemoryTicketRepository::new() });
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(notifier.clone(), std::time::Duration::from_secs(1)));
        let clock = Arc::new(ManualClock::new(t0() + Duration::hours(30)));
        let directory = Arc::new(InMemoryDirectory::with_users(vec![User::new("admin-1", "Ada", Role::Admin)]));
        let policy = EscalationPolicy::new(repo.clone(), directory, dispatcher, clock, &HelpdeskConfig::default());

        repo.insert(&ticket(Priority::Low)).await.unwrap();
        let report = policy.scan().await;

        assert_eq!(report.conflicts, 1);
        assert_eq!(report.escalated, 0);
        assert!(notifier.sent().is_empty());
    }
}
