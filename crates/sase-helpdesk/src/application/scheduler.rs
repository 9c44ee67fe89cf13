//! Periodic task runner
//!
//! One tokio task per cadence. Ticks that fall behind are skipped rather
//! than bunched, and a shutdown request lets the running cycle finish.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::application::monitor::SlaMonitor;
use crate::application::workflow::WorkflowEngine;
use crate::config::HelpdeskConfig;

pub struct Scheduler;

impl Scheduler {
    /// Spawns the SLA scan, escalation scan and workflow sweep loops. The
    /// first cycle of each runs immediately.
    pub fn start(monitor: Arc<SlaMonitor>, workflow: Arc<WorkflowEngine>, config: &HelpdeskConfig) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);

        let sla = {
            let monitor = monitor.clone();
            spawn_periodic("sla-check", config.sla_check_interval(), rx.clone(), move || {
                let monitor = monitor.clone();
                async move {
                    let report = monitor.check_sla_status().await;
                    tracing::debug!(?report, "sla check tick");
                }
            })
        };

        let escalation = spawn_periodic("escalation-check", config.escalation_check_interval(), rx.clone(), move || {
            let monitor = monitor.clone();
            async move {
                let report = monitor.check_escalations().await;
                tracing::debug!(?report, "escalation check tick");
            }
        });

        let sweep = spawn_periodic("workflow-sweep", config.workflow_sweep_interval(), rx, move || {
            let workflow = workflow.clone();
            async move {
                let report = workflow.sweep().await;
                tracing::debug!(?report, "workflow sweep tick");
            }
        });

        SchedulerHandle { shutdown: tx, tasks: vec![sla, escalation, sweep] }
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(task = name, period_secs = period.as_secs(), "periodic task started");

        loop {
            tokio::select! {
                _ = ticker.tick() => task().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(task = name, "periodic task stopped");
    })
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "scheduler task panicked");
            }
        }
    }
}
