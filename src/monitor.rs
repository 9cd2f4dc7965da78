//! Background Monitor
//!
//! Periodic maintenance tasks: integrity sweeps over every chain, archival
//! sweeps, and sealing of open blocks past their age threshold. Tasks only
//! read sealed blocks or go through the per-category critical section, so
//! they never block ingestion for long and can stop at any tick.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::audit::verify::VerifyOptions;
use crate::system::AuditLoggingSystem;

#[derive(Debug, Clone)]
pub struct MonitorIntervals {
    pub integrity: Duration,
    pub archive: Duration,
    pub stale_seal: Duration,
}

impl MonitorIntervals {
    pub fn from_system(system: &AuditLoggingSystem) -> Self {
        let config = system.config();
        Self {
            integrity: Duration::from_secs(config.integrity_check_interval_secs),
            archive: Duration::from_secs(config.archive_interval_secs),
            stale_seal: Duration::from_secs(config.block_max_age_secs),
        }
    }
}

/// Handle to the running monitor tasks
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Signal every task to stop and wait for them
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Monitor task ended abnormally: {}", e);
            }
        }
        info!("Audit monitor stopped");
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => job().await,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("{} task stopped", name);
    })
}

/// Start the integrity, archive and stale-seal tasks
pub fn start(system: Arc<AuditLoggingSystem>, intervals: MonitorIntervals) -> MonitorHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let integrity_system = system.clone();
    tasks.push(spawn_periodic(
        "Integrity sweep",
        intervals.integrity,
        shutdown_rx.clone(),
        move || {
            let system = integrity_system.clone();
            async move {
                let results = system.verify_all(VerifyOptions::default()).await;
                let failed = results.iter().filter(|r| !r.valid).count();
                if failed > 0 {
                    warn!("Integrity sweep found {} invalid chains", failed);
                } else {
                    info!("Integrity sweep passed for {} categories", results.len());
                }
            }
        },
    ));

    let archive_system = system.clone();
    tasks.push(spawn_periodic(
        "Archive sweep",
        intervals.archive,
        shutdown_rx.clone(),
        move || {
            let system = archive_system.clone();
            async move {
                system.archive_old_logs().await;
            }
        },
    ));

    tasks.push(spawn_periodic(
        "Stale block sealer",
        intervals.stale_seal,
        shutdown_rx,
        move || {
            let system = system.clone();
            async move {
                if let Err(e) = system.seal_stale_blocks().await {
                    error!("Failed to seal stale blocks: {}", e);
                }
            }
        },
    ));

    info!(
        "Audit monitor started (integrity every {:?}, archive every {:?})",
        intervals.integrity, intervals.archive
    );

    MonitorHandle { shutdown_tx, tasks }
}
