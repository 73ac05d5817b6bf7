use std::{sync::Arc, time::Duration};

use chrono::Utc;
use freight_auction_engine::{order_objects::SweepReport, LifecycleApi, SqliteDatabase};
use log::*;
use tokio::{
    sync::{watch, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};

/// The report of the most recent sweep, shared with the `/health` route.
#[derive(Clone, Default)]
pub struct SweepStatus {
    last: Arc<RwLock<Option<SweepReport>>>,
}

impl SweepStatus {
    pub async fn record(&self, report: SweepReport) {
        *self.last.write().await = Some(report);
    }

    pub async fn last(&self) -> Option<SweepReport> {
        self.last.read().await.clone()
    }
}

/// Starts the lifecycle worker. It sweeps every `interval` until a value is sent on `shutdown` or the sender is
/// dropped.
pub fn start_lifecycle_worker(
    api: LifecycleApi<SqliteDatabase>,
    interval: Duration,
    status: SweepStatus,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("🕰️ Lifecycle worker started. Sweeping every {}s", interval.as_secs());
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    trace!("🕰️ Running lifecycle sweep");
                    let report = api.sweep(Utc::now()).await;
                    log_report(&report);
                    status.record(report).await;
                },
                _ = shutdown.changed() => {
                    info!("🕰️ Lifecycle worker stopped");
                    break;
                },
            }
        }
    })
}

/// Signals the worker to stop and waits for it to finish. Returns false if the worker had already stopped and
/// could not be signalled.
pub async fn stop_lifecycle_worker(shutdown: watch::Sender<bool>, worker: JoinHandle<()>) -> bool {
    let signalled = match shutdown.send(true) {
        Ok(()) => true,
        Err(_) => {
            debug!("🕰️ The lifecycle worker had already stopped before the shutdown signal was sent");
            false
        },
    };
    if let Err(e) = worker.await {
        error!("🕰️ The lifecycle worker did not shut down cleanly. {e}");
    }
    signalled
}

fn log_report(report: &SweepReport) {
    if !report.ran {
        return;
    }
    let cancelled = report.cancelled_masters.len() + report.cancelled_lots.len();
    if cancelled + report.completed.len() + report.warnings + report.reminders > 0 {
        info!(
            "🕰️ Sweep done. {} warnings, {} reminders, {} orders cancelled, {} completed",
            report.warnings,
            report.reminders,
            cancelled,
            report.completed.len()
        );
    }
    debug!("🕰️ Expired {} trust tokens and pruned {} order locks", report.expired_tokens, report.pruned_locks);
    if report.failures > 0 {
        error!("🕰️ {} orders could not be checked during the sweep", report.failures);
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test]
    async fn stopping_a_finished_worker_is_harmless() {
        let (shutdown, signal) = watch::channel(false);
        drop(signal);
        let worker = tokio::spawn(async {});
        assert!(!stop_lifecycle_worker(shutdown, worker).await);
    }

    #[tokio::test]
    async fn stopping_a_running_worker_signals_it() {
        let (shutdown, mut signal) = watch::channel(false);
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let worker = tokio::spawn(async move {
            if signal.changed().await.is_ok() {
                flag.store(*signal.borrow(), Ordering::SeqCst);
            }
        });
        assert!(stop_lifecycle_worker(shutdown, worker).await);
        assert!(stopped.load(Ordering::SeqCst));
    }
}
