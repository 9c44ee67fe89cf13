//! Application layer
//!
//! Orchestrates the ticket use cases and the scheduled SLA work.

pub mod dispatcher;
pub mod dto;
pub mod escalation;
pub mod monitor;
pub mod scheduler;
pub mod service;
pub mod workflow;

use std::sync::Arc;

pub use dispatcher::NotificationDispatcher;
pub use dto::*;
pub use escalation::{EscalationPolicy, EscalationReason};
pub use monitor::SlaMonitor;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use service::TicketService;
pub use workflow::{default_rules, RuleTestReport, WorkflowEngine, WorkflowOutcome};

use crate::config::HelpdeskConfig;
use crate::domain::aggregates::User;
use crate::infrastructure::{
    InMemoryDirectory, InMemoryNotificationLog, InMemoryTicketRepository, RandomAgentSelector,
};
use crate::ports::outbound::{AgentSelector, Clock, Directory, NotificationLog, Notifier, TicketRepository};
use crate::Result;

/// Collaborators the engine is wired against.
pub struct HelpdeskAdapters {
    pub tickets: Arc<dyn TicketRepository>,
    pub log: Arc<dyn NotificationLog>,
    pub directory: Arc<dyn Directory>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub selector: Arc<dyn AgentSelector>,
}

impl HelpdeskAdapters {
    /// In-memory stores with an empty directory and random agent selection.
    pub fn in_memory(clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            tickets: Arc::new(InMemoryTicketRepository::new()),
            log: Arc::new(InMemoryNotificationLog::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            notifier,
            clock,
            selector: Arc::new(RandomAgentSelector::new()),
        }
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.directory = Arc::new(InMemoryDirectory::with_users(users));
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn AgentSelector>) -> Self {
        self.selector = selector;
        self
    }
}

/// Fully wired helpdesk core.
pub struct Helpdesk {
    config: HelpdeskConfig,
    tickets: Arc<dyn TicketRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    workflow: Arc<WorkflowEngine>,
    escalation: Arc<EscalationPolicy>,
    monitor: Arc<SlaMonitor>,
    service: Arc<TicketService>,
}

impl Helpdesk {
    /// Validates the config and installs the default workflow rules.
    pub fn new(config: HelpdeskConfig, adapters: HelpdeskAdapters) -> Result<Self> {
        config.validate()?;

        let dispatcher = Arc::new(NotificationDispatcher::new(adapters.notifier, config.notify_timeout()));

        let workflow = Arc::new(WorkflowEngine::new(
            adapters.tickets.clone(),
            adapters.directory.clone(),
            dispatcher.clone(),
            adapters.selector,
            adapters.clock.clone(),
        ));
        workflow.install_default_rules(&config)?;

        let escalation = Arc::new(
            EscalationPolicy::new(
                adapters.tickets.clone(),
                adapters.directory.clone(),
                dispatcher.clone(),
                adapters.clock.clone(),
                &config,
            )
            .with_workflow(workflow.clone()),
        );

        let monitor = Arc::new(SlaMonitor::new(
            adapters.tickets.clone(),
            adapters.log,
            adapters.directory,
            dispatcher.clone(),
            escalation.clone(),
            adapters.clock.clone(),
            &config,
        ));

        let service = Arc::new(TicketService::new(
            adapters.tickets.clone(),
            workflow.clone(),
            adapters.clock,
            config.sla_policy(),
        ));

        tracing::info!(rules = workflow.list_rules().len(), "helpdesk core initialized");

        Ok(Self {
            config,
            tickets: adapters.tickets,
            dispatcher,
            workflow,
            escalation,
            monitor,
            service,
        })
    }

    pub fn start_scheduler(&self) -> SchedulerHandle {
        Scheduler::start(self.monitor.clone(), self.workflow.clone(), &self.config)
    }

    pub fn config(&self) -> &HelpdeskConfig {
        &self.config
    }

    pub fn tickets(&self) -> &Arc<dyn TicketRepository> {
        &self.tickets
    }

    pub fn service(&self) -> &Arc<TicketService> {
        &self.service
    }

    pub fn monitor(&self) -> &Arc<SlaMonitor> {
        &self.monitor
    }

    pub fn escalation(&self) -> &Arc<EscalationPolicy> {
        &self.escalation
    }

    pub fn workflow(&self) -> &Arc<WorkflowEngine> {
        &self.workflow
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }
}
