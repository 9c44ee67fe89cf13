//! Ticket application service
//!
//! The interactive mutation boundary. Every write is saved against the
//! version the caller read, then the triggers it produced are run through
//! the workflow engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::{CreateTicketCommand, TicketView, UpdateTicketCommand};
use crate::application::workflow::WorkflowEngine;
use crate::domain::aggregates::Ticket;
use crate::domain::events::TicketEvent;
use crate::domain::rules::Trigger;
use crate::domain::sla::SlaPolicy;
use crate::domain::value_objects::{Actor, Priority, Role, TicketId};
use crate::ports::inbound::TicketUseCases;
use crate::ports::outbound::{Clock, TicketRepository};
use crate::{HelpdeskError, Result};

pub struct TicketService {
    tickets: Arc<dyn TicketRepository>,
    workflow: Arc<WorkflowEngine>,
    clock: Arc<dyn Clock>,
    policy: SlaPolicy,
}

impl TicketService {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        workflow: Arc<WorkflowEngine>,
        clock: Arc<dyn Clock>,
        policy: SlaPolicy,
    ) -> Self {
        Self { tickets, workflow, clock, policy }
    }

    async fn load(&self, id: &TicketId) -> Result<Ticket> {
        self.tickets
            .get(id)
            .await?
            .ok_or_else(|| HelpdeskError::NotFound(format!("ticket {}", id)))
    }

    fn authorize(ticket: &Ticket, actor: &Actor) -> Result<()> {
        match actor {
            Actor::System => Ok(()),
            Actor::User { id, role } if ticket.can_be_modified(*role, id) => Ok(()),
            Actor::User { id, .. } => Err(HelpdeskError::Unauthorized(format!(
                "{} may not modify ticket {}",
                id,
                ticket.id()
            ))),
        }
    }

    /// Runs each trigger in order against the latest stored state.
    async fn run_triggers(&self, mut ticket: Ticket, triggers: Vec<Trigger>, actor: &Actor) -> Ticket {
        for trigger in triggers {
            let outcome = self.workflow.execute_rules(&ticket, trigger, actor).await;
            ticket = outcome.ticket;
        }
        ticket
    }
}

/// `ticket_updated` first, then each specific trigger once, in event order.
fn update_triggers(events: &[TicketEvent]) -> Vec<Trigger> {
    let mut triggers = vec![Trigger::TicketUpdated];
    for trigger in events.iter().flat_map(TicketEvent::triggers) {
        if !triggers.contains(&trigger) {
            triggers.push(trigger);
        }
    }
    triggers
}

#[async_trait]
impl TicketUseCases for TicketService {
    async fn create_ticket(&self, command: CreateTicketCommand, actor: &Actor) -> Result<Ticket> {
        if command.title.trim().is_empty() {
            return Err(HelpdeskError::Validation("title is required".into()));
        }
        if command.category.trim().is_empty() {
            return Err(HelpdeskError::Validation("category is required".into()));
        }
        if let Actor::User { id, role: Role::Customer } = actor {
            if *id != command.created_by {
                return Err(HelpdeskError::Unauthorized(format!(
                    "{} may not open tickets for {}",
                    id, command.created_by
                )));
            }
        }

        let now = self.clock.now();
        let priority = command
            .priority
            .as_deref()
            .map(Priority::parse_or_default)
            .unwrap_or_default();

        let mut ticket = Ticket::create(command.title, command.created_by, command.category, priority, now);
        for tag in command.tags {
            ticket.add_tag(tag, now);
        }
        ticket.take_events();

        let stored = self.tickets.insert(&ticket).await?;
        tracing::info!(ticket_id = %stored.id(), priority = %stored.priority(), "ticket created");

        Ok(self.run_triggers(stored, vec![Trigger::TicketCreated], actor).await)
    }

    async fn update_ticket(&self, command: UpdateTicketCommand, actor: &Actor) -> Result<Ticket> {
        let current = self.load(&command.ticket_id).await?;
        Self::authorize(&current, actor)?;
        if current.version() != command.expected_version {
            return Err(HelpdeskError::VersionConflict {
                ticket_id: current.id().to_string(),
                expected: command.expected_version,
                actual: current.version(),
            });
        }

        let now = self.clock.now();
        let mut working = current.clone();
        if let Some(status) = command.status {
            working.change_status(status, now)?;
        }
        if let Some(priority) = command.priority {
            working.change_priority(priority, now);
        }
        if let Some(agent) = command.assigned_to {
            working.assign(agent, now);
        }
        if let Some(category) = command.category {
            working.set_category(category, now);
        }
        for tag in command.add_tags {
            working.add_tag(tag, now);
        }

        let events = working.take_events();
        if events.is_empty() {
            return Ok(current);
        }

        let saved = self.tickets.save(&working, command.expected_version).await?;
        tracing::info!(ticket_id = %saved.id(), version = saved.version(), "ticket updated");

        Ok(self.run_triggers(saved, update_triggers(&events), actor).await)
    }

    async fn add_internal_note(
        &self,
        ticket_id: &TicketId,
        expected_version: u64,
        text: String,
        actor: &Actor,
    ) -> Result<Ticket> {
        if let Actor::User { id, role } = actor {
            if !role.is_privileged() {
                return Err(HelpdeskError::Unauthorized(format!("{} may not write internal notes", id)));
            }
        }
        if text.trim().is_empty() {
            return Err(HelpdeskError::Validation("note text is required".into()));
        }

        let mut ticket = self.load(ticket_id).await?;
        Self::authorize(&ticket, actor)?;
        ticket.add_internal_note(text, actor.note_author(), self.clock.now());
        ticket.take_events();

        Ok(self.tickets.save(&ticket, expected_version).await?)
    }

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<TicketView> {
        let ticket = self.load(ticket_id).await?;
        Ok(TicketView::at(ticket, &self.policy, self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::NotificationDispatcher;
    use crate::domain::rules::{Action, Rule};
    use crate::domain::sla::SlaStatus;
    use crate::domain::value_objects::{NoteAuthor, TicketStatus, UserId};
    use crate::infrastructure::{
        FirstAvailableSelector, InMemoryDirectory, InMemoryTicketRepository, ManualClock, RecordingNotifier,
    };
    use chrono::{DateTime, Duration, Utc};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn service() -> (TicketService, Arc<WorkflowEngine>, Arc<ManualClock>) {
        let tickets = Arc::new(InMemoryTicketRepository::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(RecordingNotifier::new()),
            std::time::Duration::from_secs(1),
        ));
        let workflow = Arc::new(WorkflowEngine::new(
            tickets.clone(),
            Arc::new(InMemoryDirectory::new()),
            dispatcher,
            Arc::new(FirstAvailableSelector),
            clock.clone(),
        ));
        let svc = TicketService::new(tickets, workflow.clone(), clock.clone(), SlaPolicy::default());
        (svc, workflow, clock)
    }

    fn command(priority: &str) -> CreateTicketCommand {
        CreateTicketCommand {
            title: "Cannot reach portal".into(),
            created_by: UserId::from_string("cust-1"),
            category: "technical".into(),
            priority: Some(priority.into()),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_defaults_unknown_priority() {
        let (svc, _, _) = service();
        let customer = Actor::user("cust-1", Role::Customer);

        let ticket = svc.create_ticket(command("whenever"), &customer).await.unwrap();
        assert_eq!(ticket.priority(), Priority::Medium);
        assert_eq!(ticket.version(), 0);
        assert_eq!(ticket.due_date(), t0() + Duration::hours(24));

        let other = Actor::user("cust-2", Role::Customer);
        assert!(matches!(
            svc.create_ticket(command("low"), &other).await,
            Err(HelpdeskError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_update_bumps_version_once() {
        let (svc, _, clock) = service();
        let agent = Actor::user("agent-1", Role::Agent);
        let ticket = svc.create_ticket(command("high"), &Actor::System).await.unwrap();

        clock.advance(Duration::minutes(30));
        let cmd = UpdateTicketCommand::new(ticket.id().clone(), 0)
            .status(TicketStatus::InProgress)
            .priority(Priority::Urgent)
            .assign(UserId::from_string("agent-1"))
            .tag("vpn");
        let updated = svc.update_ticket(cmd, &agent).await.unwrap();

        assert_eq!(updated.version(), 1);
        assert_eq!(updated.due_date(), t0() + Duration::hours(2));
        assert_eq!(updated.sla().first_response_at, Some(t0() + Duration::minutes(30)));

        let noop = UpdateTicketCommand::new(ticket.id().clone(), 1).tag("vpn");
        assert_eq!(svc.update_ticket(noop, &agent).await.unwrap().version(), 1);
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected_unchanged() {
        let (svc, _, _) = service();
        let ticket = svc.create_ticket(command("low"), &Actor::System).await.unwrap();
        svc.update_ticket(UpdateTicketCommand::new(ticket.id().clone(), 0).tag("a"), &Actor::System)
            .await
            .unwrap();

        let stale = UpdateTicketCommand::new(ticket.id().clone(), 0).priority(Priority::Urgent);
        let err = svc.update_ticket(stale, &Actor::System).await.unwrap_err();
        assert!(err.is_conflict());

        let view = svc.get_ticket(ticket.id()).await.unwrap();
        assert_eq!(view.ticket.priority(), Priority::Low);
        assert_eq!(view.ticket.version(), 1);
    }

    #[tokio::test]
    async fn test_resolution_triggers_rules() {
        let (svc, workflow, _) = service();
        workflow
            .register_rule(Rule::new("tag-resolved", Trigger::TicketResolved).then(Action::AddTag { value: "done".into() }))
            .unwrap();
        let ticket = svc.create_ticket(command("low"), &Actor::System).await.unwrap();

        let resolved = svc
            .update_ticket(
                UpdateTicketCommand::new(ticket.id().clone(), 0).status(TicketStatus::Resolved),
                &Actor::System,
            )
            .await
            .unwrap();
        assert_eq!(resolved.tags(), ["done".to_string()]);
        assert_eq!(resolved.version(), 2);

        let view = svc.get_ticket(ticket.id()).await.unwrap();
        assert_eq!(view.sla_status, SlaStatus::Completed);
        assert_eq!(view.time_remaining_hours, None);
    }

    #[tokio::test]
    async fn test_internal_notes_are_privileged() {
        let (svc, _, _) = service();
        let ticket = svc.create_ticket(command("low"), &Actor::System).await.unwrap();

        let customer = Actor::user("cust-1", Role::Customer);
        assert!(svc
            .add_internal_note(ticket.id(), 0, "peek".into(), &customer)
            .await
            .is_err());

        let agent = Actor::user("agent-1", Role::Agent);
        let noted = svc
            .add_internal_note(ticket.id(), 0, "called the customer".into(), &agent)
            .await
            .unwrap();
        assert_eq!(noted.version(), 1);
        assert_eq!(noted.internal_notes()[0].author, NoteAuthor::User(UserId::from_string("agent-1")));

        assert!(matches!(
            svc.get_ticket(&TicketId::from_string("nope")).await,
            Err(HelpdeskError::NotFound(_))
        ));
    }
}
