//! Periodic refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::coordinator::{SyncCoordinator, TriggerOutcome};

/// Triggers the coordinator on a fixed period.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Start triggering `coordinator` every `period`, beginning immediately.
    pub fn spawn(coordinator: Arc<SyncCoordinator>, period: Duration) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Sync scheduler started, period {}s", period.as_secs());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let TriggerOutcome::Coalesced = coordinator.trigger().await {
                            debug!("Scheduled trigger coalesced");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Sync scheduler stopped");
        });

        SchedulerHandle { shutdown: shutdown_tx, task }
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scheduling new cycles and wait for an in-flight one to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Whether the scheduler loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
