//! OpenSASE Helpdesk SLA daemon - Main Entry Point

use std::sync::Arc;

use sase_helpdesk::application::HelpdeskAdapters;
use sase_helpdesk::infrastructure::{SystemClock, TracingNotifier};
use sase_helpdesk::{Helpdesk, HelpdeskConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("OpenSASE Helpdesk SLA daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = HelpdeskConfig::from_env();
    let users = config.users.clone();

    let adapters = HelpdeskAdapters::in_memory(Arc::new(SystemClock), Arc::new(TracingNotifier)).with_users(users);
    let helpdesk = Helpdesk::new(config, adapters)?;

    let scheduler = helpdesk.start_scheduler();
    tracing::info!(
        sla_check_secs = helpdesk.config().sla_check_interval_secs,
        escalation_check_secs = helpdesk.config().escalation_check_interval_secs,
        "scheduler running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    scheduler.shutdown().await;

    Ok(())
}
