//! Workflow Rule Engine
//!
//! Name-keyed rule registry evaluated against tickets on lifecycle
//! triggers. Each matching rule applies its actions to a working copy and
//! saves the result as one versioned write. A failing rule is logged and
//! skipped; later rules still run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::application::dispatcher::NotificationDispatcher;
use crate::application::dto::SweepReport;
use crate::config::HelpdeskConfig;
use crate::domain::aggregates::Ticket;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::rules::{
    render_template, Action, AgentTarget, Condition, NotifyTarget, Operator, Rule, TicketField, Trigger,
};
use crate::domain::value_objects::{Actor, Priority, TicketStatus};
use crate::ports::outbound::{AgentSelector, Clock, Directory, TicketFilter, TicketRepository};
use crate::{HelpdeskError, Result, RuleEvaluationError};

/// Result of running the rules for one trigger.
#[derive(Debug)]
pub struct WorkflowOutcome {
    /// Latest stored state after all successful rules.
    pub ticket: Ticket,
    pub fired: Vec<String>,
    pub errors: Vec<RuleEvaluationError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionResult {
    pub condition: Condition,
    pub passed: bool,
}

/// Dry-run report from [`WorkflowEngine::test_rule`].
#[derive(Debug, Clone, Serialize)]
pub struct RuleTestReport {
    pub rule: String,
    pub trigger: Trigger,
    pub enabled: bool,
    pub conditions: Vec<ConditionResult>,
    pub matched: bool,
    pub actions: Vec<Action>,
}

pub struct WorkflowEngine {
    rules: RwLock<Vec<Rule>>,
    tickets: Arc<dyn TicketRepository>,
    directory: Arc<dyn Directory>,
    dispatcher: Arc<NotificationDispatcher>,
    selector: Arc<dyn AgentSelector>,
    clock: Arc<dyn Clock>,
}

impl WorkflowEngine {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        directory: Arc<dyn Directory>,
        dispatcher: Arc<NotificationDispatcher>,
        selector: Arc<dyn AgentSelector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            tickets,
            directory,
            dispatcher,
            selector,
            clock,
        }
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Registering under an existing name replaces that rule in place.
    pub fn register_rule(&self, rule: Rule) -> Result<()> {
        rule.validate()?;
        tracing::info!(rule = %rule.name, trigger = %rule.trigger, "registering workflow rule");

        let mut rules = self.rules.write();
        match rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        Ok(())
    }

    pub fn remove_rule(&self, name: &str) -> Result<Rule> {
        let mut rules = self.rules.write();
        let idx = rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| HelpdeskError::NotFound(format!("rule '{}'", name)))?;
        tracing::info!(rule = %name, "removing workflow rule");
        Ok(rules.remove(idx))
    }

    pub fn list_rules(&self) -> Vec<Rule> {
        self.rules.read().clone()
    }

    pub fn install_default_rules(&self, config: &HelpdeskConfig) -> Result<()> {
        for rule in default_rules(config) {
            self.register_rule(rule)?;
        }
        Ok(())
    }

    /// Evaluates every condition against `sample` without side effects.
    pub fn test_rule(&self, name: &str, sample: &Ticket) -> Result<RuleTestReport> {
        let rule = self
            .rules
            .read()
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| HelpdeskError::NotFound(format!("rule '{}'", name)))?;

        let now = self.clock.now();
        let conditions: Vec<ConditionResult> = rule
            .conditions
            .iter()
            .map(|c| ConditionResult { condition: c.clone(), passed: c.evaluate(sample, now) })
            .collect();
        let matched = conditions.iter().all(|c| c.passed);

        Ok(RuleTestReport {
            rule: rule.name,
            trigger: rule.trigger,
            enabled: rule.enabled,
            conditions,
            matched,
            actions: if matched { rule.actions } else { vec![] },
        })
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Runs enabled rules for `trigger` in registry order.
    ///
    /// Mutations made by rules do not fire further triggers.
    pub async fn execute_rules(&self, ticket: &Ticket, trigger: Trigger, actor: &Actor) -> WorkflowOutcome {
        let now = self.clock.now();
        let rules: Vec<Rule> = self
            .rules
            .read()
            .iter()
            .filter(|r| r.enabled && r.trigger == trigger)
            .cloned()
            .collect();

        let mut outcome = WorkflowOutcome { ticket: ticket.clone(), fired: vec![], errors: vec![] };

        for rule in rules {
            if !rule.matches(&outcome.ticket, now) {
                continue;
            }

            match self.run_rule(&rule, &outcome.ticket, actor, now).await {
                Ok(saved) => {
                    tracing::info!(
                        rule = %rule.name,
                        ticket_id = %outcome.ticket.id(),
                        trigger = %trigger,
                        "workflow rule fired"
                    );
                    if let Some(saved) = saved {
                        outcome.ticket = saved;
                    }
                    outcome.fired.push(rule.name.clone());
                }
                Err(source) => {
                    let err = RuleEvaluationError { rule: rule.name.clone(), source };
                    tracing::warn!(ticket_id = %outcome.ticket.id(), error = %err, "workflow rule failed");
                    outcome.errors.push(err);
                }
            }
        }

        outcome
    }

    /// Runs `scheduled_sweep` rules over every ticket still being tracked.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let filter = TicketFilter::default().with_statuses(&[
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
        ]);

        let tickets = match self.tickets.find_matching(&filter).await {
            Ok(tickets) => tickets,
            Err(e) => {
                tracing::error!(error = %e, "workflow sweep query failed");
                return report;
            }
        };

        for ticket in tickets {
            report.examined += 1;
            let outcome = self.execute_rules(&ticket, Trigger::ScheduledSweep, &Actor::System).await;
            report.rules_fired += outcome.fired.len() as u64;
            report.rule_failures += outcome.errors.len() as u64;
        }

        self.dispatcher.settle().await;
        tracing::debug!(?report, "workflow sweep complete");
        report
    }

    async fn run_rule(
        &self,
        rule: &Rule,
        current: &Ticket,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Option<Ticket>> {
        let mut working = current.clone();
        let mut outbox = Vec::new();
        let mut changed = false;

        for action in &rule.actions {
            changed |= self.apply_action(action, &mut working, now, &mut outbox).await?;
        }

        let saved = if changed {
            if let Actor::User { id, role } = actor {
                if !current.can_be_modified(*role, id) {
                    return Err(HelpdeskError::Unauthorized(format!(
                        "{} may not modify ticket {}",
                        id,
                        current.id()
                    )));
                }
            }
            working.take_events();
            Some(self.tickets.save(&working, current.version()).await?)
        } else {
            None
        };

        self.dispatcher.dispatch_all(outbox);
        Ok(saved)
    }

    /// Returns whether the ticket itself changed.
    async fn apply_action(
        &self,
        action: &Action,
        ticket: &mut Ticket,
        now: DateTime<Utc>,
        outbox: &mut Vec<Notification>,
    ) -> Result<bool> {
        match action {
            Action::AssignToAgent { agent } => {
                let chosen = match agent {
                    AgentTarget::Agent(id) => {
                        let user = self
                            .directory
                            .find_user(id)
                            .await?
                            .filter(|u| u.is_active && u.role.is_privileged())
                            .ok_or_else(|| HelpdeskError::NotFound(format!("agent {}", id)))?;
                        Some(user.id)
                    }
                    AgentTarget::Specialist(tag) => {
                        let candidates = self.directory.find_active_agents_by_specialization(tag).await?;
                        let picked = self.selector.select(&candidates);
                        if picked.is_none() {
                            tracing::debug!(
                                ticket_id = %ticket.id(),
                                specialization = %tag,
                                "no available specialist, leaving ticket unassigned"
                            );
                        }
                        picked
                    }
                };

                let Some(agent_id) = chosen else {
                    return Ok(false);
                };
                if !ticket.assign(agent_id.clone(), now) {
                    return Ok(false);
                }
                outbox.push(
                    Notification::new(
                        agent_id,
                        NotificationKind::TicketAssigned,
                        "New ticket assigned",
                        format!("Ticket \"{}\" has been assigned to you", ticket.title()),
                        now,
                    )
                    .for_ticket(ticket.id().clone(), ticket.priority()),
                );
                Ok(true)
            }

            Action::ChangePriority { value } => Ok(ticket.change_priority(*value, now)),

            Action::ChangeStatus { value } => ticket.change_status(*value, now),

            Action::AddTag { value } => Ok(ticket.add_tag(value.clone(), now)),

            Action::SendNotification { recipient, title, message } => {
                let to = match recipient {
                    NotifyTarget::Creator => Some(ticket.created_by().clone()),
                    NotifyTarget::Assignee => ticket.assigned_to().cloned(),
                    NotifyTarget::User(id) => Some(id.clone()),
                };
                if let Some(to) = to {
                    outbox.push(
                        Notification::new(
                            to,
                            NotificationKind::WorkflowNotification,
                            render_template(title, ticket),
                            render_template(message, ticket),
                            now,
                        )
                        .for_ticket(ticket.id().clone(), ticket.priority()),
                    );
                }
                Ok(false)
            }

            Action::EscalateToAdmin => {
                for admin in self.directory.find_active_admins().await? {
                    outbox.push(
                        Notification::new(
                            admin.id,
                            NotificationKind::TicketEscalated,
                            "Ticket requires admin attention",
                            format!("Ticket \"{}\" ({} priority) was escalated by a workflow rule", ticket.title(), ticket.priority()),
                            now,
                        )
                        .for_ticket(ticket.id().clone(), ticket.priority()),
                    );
                }
                Ok(false)
            }
        }
    }
}

/// Rules shipped with the engine.
pub fn default_rules(config: &HelpdeskConfig) -> Vec<Rule> {
    let mut rules: Vec<Rule> = config
        .specialist_routes
        .iter()
        .map(|(category, specialization)| {
            Rule::new(format!("auto-assign-{}", category), Trigger::TicketCreated)
                .when(Condition::equals(TicketField::Category, category.as_str()))
                .when(Condition::equals(TicketField::AssignedTo, serde_json::Value::Null))
                .then(Action::AssignToAgent { agent: AgentTarget::Specialist(specialization.clone()) })
        })
        .collect();

    rules.push(
        Rule::new("notify-admins-urgent", Trigger::TicketCreated)
            .when(Condition::equals(TicketField::Priority, Priority::Urgent.as_str()))
            .when(Condition::equals(TicketField::Status, TicketStatus::Open.as_str()))
            .then(Action::EscalateToAdmin),
    );

    rules.push(
        Rule::new("auto-close-resolved", Trigger::ScheduledSweep)
            .when(Condition::equals(TicketField::Status, TicketStatus::Resolved.as_str()))
            .when(Condition::new(TicketField::ResolvedAt, Operator::GreaterThan, config.auto_close_grace_days))
            .then(Action::ChangeStatus { value: TicketStatus::Closed })
            .then(Action::SendNotification {
                recipient: NotifyTarget::Creator,
                title: "Ticket closed".into(),
                message: format!(
                    "Your ticket \"{{{{title}}}}\" was closed automatically after {} days without activity.",
                    config.auto_close_grace_days
                ),
            }),
    );

    rules
}
