use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audit_ledger::monitor::{self, MonitorIntervals};
use audit_ledger::{AuditConfig, AuditLoggingSystem};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audit_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting audit ledger");

    // Optional config file as the only argument, otherwise AUDIT_* variables
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AuditConfig::load(config_path.as_deref())?;
    info!("Configuration loaded (storage: {:?})", config.storage_dir);

    let system = Arc::new(AuditLoggingSystem::open(config)?);
    let monitor = monitor::start(system.clone(), MonitorIntervals::from_system(&system));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    monitor.shutdown().await;
    if let Err(e) = system.shutdown().await {
        error!("Failed to seal open blocks on shutdown: {}", e);
        return Err(e.into());
    }

    info!("Audit ledger stopped");
    Ok(())
}
