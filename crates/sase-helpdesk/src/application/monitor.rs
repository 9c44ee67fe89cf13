//! SLA Monitor
//!
//! Periodic warning and breach scans. Each notification kind fires at most
//! once per ticket per de-duplication window, and a fired breach escalates
//! the ticket. Failures are contained per ticket.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::application::dispatcher::NotificationDispatcher;
use crate::application::dto::{EscalationReport, SlaScanReport, SlaStats};
use crate::application::escalation::{EscalationPolicy, EscalationReason};
use crate::config::HelpdeskConfig;
use crate::domain::aggregates::Ticket;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::sla::{SlaPolicy, SlaStatus};
use crate::domain::value_objects::UserId;
use crate::ports::outbound::{Clock, Directory, NotificationLog, TicketFilter, TicketRepository};
use crate::{HelpdeskError, Result, ScanIterationError};

pub struct SlaMonitor {
    tickets: Arc<dyn TicketRepository>,
    log: Arc<dyn NotificationLog>,
    directory: Arc<dyn Directory>,
    dispatcher: Arc<NotificationDispatcher>,
    escalation: Arc<EscalationPolicy>,
    clock: Arc<dyn Clock>,
    policy: SlaPolicy,
    warning_window: (Duration, Duration),
    warning_dedup: Duration,
    breach_dedup: Duration,
}

/// What happened to one ticket in a scan.
enum Fired {
    Skipped,
    Notified,
    Escalated,
    Conflict,
}

impl SlaMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        log: Arc<dyn NotificationLog>,
        directory: Arc<dyn Directory>,
        dispatcher: Arc<NotificationDispatcher>,
        escalation: Arc<EscalationPolicy>,
        clock: Arc<dyn Clock>,
        config: &HelpdeskConfig,
    ) -> Self {
        Self {
            tickets,
            log,
            directory,
            dispatcher,
            escalation,
            clock,
            policy: config.sla_policy(),
            warning_window: config.warning_window(),
            warning_dedup: config.warning_dedup(),
            breach_dedup: config.breach_dedup(),
        }
    }

    pub fn policy(&self) -> &SlaPolicy {
        &self.policy
    }

    /// The frequent pass: warnings first, then breaches.
    pub async fn check_sla_status(&self) -> SlaScanReport {
        let now = self.clock.now();
        let mut report = SlaScanReport::default();

        self.scan_warnings(now, &mut report).await;
        self.scan_breaches(now, &mut report).await;

        self.dispatcher.settle().await;
        tracing::debug!(?report, "sla scan complete");
        report
    }

    /// The hourly pass.
    pub async fn check_escalations(&self) -> EscalationReport {
        self.escalation.scan().await
    }

    pub async fn get_sla_stats(&self) -> Result<SlaStats> {
        let now = self.clock.now();
        let tickets = self.tickets.find_matching(&TicketFilter::default()).await?;

        let mut stats = SlaStats::default();
        for ticket in &tickets {
            stats.total += 1;
            match ticket.sla_status(&self.policy, now) {
                SlaStatus::OnTime => stats.on_time += 1,
                SlaStatus::Warning => stats.warning += 1,
                SlaStatus::ResponseBreach => stats.response_breach += 1,
                SlaStatus::ResolutionBreach => stats.resolution_breach += 1,
                SlaStatus::Completed => stats.completed += 1,
            }
        }

        let tracked = stats.total - stats.completed;
        let breached = stats.response_breach + stats.resolution_breach;
        stats.compliance_rate = if tracked == 0 {
            100.0
        } else {
            (tracked - breached) as f64 * 100.0 / tracked as f64
        };
        Ok(stats)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    async fn scan_warnings(&self, now: DateTime<Utc>, report: &mut SlaScanReport) {
        let (start, end) = self.warning_window;
        let (Some(from), Some(until)) = (now.checked_add_signed(start), now.checked_add_signed(end)) else {
            tracing::error!(%now, "sla warning window out of range");
            report.failures += 1;
            return;
        };
        let filter = TicketFilter::active().due_between(from, until);

        let tickets = match self.tickets.find_matching(&filter).await {
            Ok(tickets) => tickets,
            Err(e) => {
                tracing::error!(error = %e, "sla warning query failed");
                report.failures += 1;
                return;
            }
        };

        for ticket in tickets {
            match self.warn(&ticket, now).await {
                Ok(Fired::Notified) => report.warnings_sent += 1,
                Ok(_) => {}
                Err(source) => {
                    let err = ScanIterationError { ticket_id: ticket.id().clone(), stage: "sla warning", source };
                    tracing::error!(error = %err, "sla scan iteration failed");
                    report.failures += 1;
                }
            }
        }
    }

    async fn scan_breaches(&self, now: DateTime<Utc>, report: &mut SlaScanReport) {
        let filter = TicketFilter::active().overdue_at(now);

        let tickets = match self.tickets.find_matching(&filter).await {
            Ok(tickets) => tickets,
            Err(e) => {
                tracing::error!(error = %e, "sla breach query failed");
                report.failures += 1;
                return;
            }
        };

        for ticket in tickets {
            match self.breach(&ticket, now).await {
                Ok(Fired::Escalated) => {
                    report.breaches_sent += 1;
                    report.escalated += 1;
                }
                Ok(Fired::Conflict) => report.conflicts += 1,
                Ok(_) => {}
                Err(source) => {
                    let err = ScanIterationError { ticket_id: ticket.id().clone(), stage: "sla breach", source };
                    tracing::error!(error = %err, "sla scan iteration failed");
                    report.failures += 1;
                }
            }
        }
    }

    async fn warn(&self, ticket: &Ticket, now: DateTime<Utc>) -> Result<Fired> {
        if self.recently_sent(ticket, NotificationKind::SlaWarning, self.warning_dedup, now).await? {
            return Ok(Fired::Skipped);
        }

        let message = format!(
            "Ticket \"{}\" is due in {} minutes",
            ticket.title(),
            (ticket.due_date() - now).num_minutes()
        );
        self.log.record(ticket.id(), NotificationKind::SlaWarning, now).await?;
        self.notify(ticket, NotificationKind::SlaWarning, "SLA warning", &message, ticket_parties(ticket), now);

        tracing::info!(ticket_id = %ticket.id(), due = %ticket.due_date(), "sla warning fired");
        Ok(Fired::Notified)
    }

    /// The dedup entry is written only once recipients are resolved and the
    /// escalation has landed, so a failed or lost cycle is retried next tick.
    async fn breach(&self, ticket: &Ticket, now: DateTime<Utc>) -> Result<Fired> {
        if self.recently_sent(ticket, NotificationKind::SlaBreach, self.breach_dedup, now).await? {
            return Ok(Fired::Skipped);
        }

        let mut recipients = ticket_parties(ticket);
        for admin in self.directory.find_active_admins().await? {
            if !recipients.contains(&admin.id) {
                recipients.push(admin.id);
            }
        }

        let escalated = match self.escalation.escalate(ticket, &EscalationReason::SlaBreach).await {
            Ok(escalated) => escalated,
            Err(e @ HelpdeskError::VersionConflict { .. }) => {
                tracing::warn!(ticket_id = %ticket.id(), error = %e, "breach escalation lost version race, retrying next tick");
                return Ok(Fired::Conflict);
            }
            Err(e) => return Err(e),
        };

        self.log.record(ticket.id(), NotificationKind::SlaBreach, now).await?;
        let message = format!(
            "Ticket \"{}\" passed its due date of {}",
            ticket.title(),
            ticket.due_date().format("%Y-%m-%d %H:%M UTC")
        );
        self.notify(&escalated, NotificationKind::SlaBreach, "SLA breached", &message, recipients, now);

        tracing::info!(ticket_id = %ticket.id(), due = %ticket.due_date(), "sla breach fired");
        Ok(Fired::Escalated)
    }

    async fn recently_sent(
        &self,
        ticket: &Ticket,
        kind: NotificationKind,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let last = self.log.last_sent(ticket.id(), kind).await?;
        Ok(last.map_or(false, |at| now - at < window))
    }

    fn notify(
        &self,
        ticket: &Ticket,
        kind: NotificationKind,
        title: &str,
        message: &str,
        recipients: Vec<UserId>,
        now: DateTime<Utc>,
    ) {
        self.dispatcher.dispatch_all(recipients.into_iter().map(|to| {
            Notification::new(to, kind, title, message, now).for_ticket(ticket.id().clone(), ticket.priority())
        }));
    }
}

/// Creator plus assignee, without duplicates.
fn ticket_parties(ticket: &Ticket) -> Vec<UserId> {
    let mut parties = vec![ticket.created_by().clone()];
    if let Some(agent) = ticket.assigned_to() {
        if agent != ticket.created_by() {
            parties.push(agent.clone());
        }
    }
    parties
}
