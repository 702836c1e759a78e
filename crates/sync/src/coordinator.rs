//! The sync coordinator - runs the fetch, normalize, analyze cycle.
//!
//! ```text
//! idle|ready|error → fetching → normalizing → analyzing → ready
//!                        └──────────┴─────────────┴──→ error
//! ```
//!
//! The published snapshot is swapped atomically through a watch channel, so
//! readers always see either the previous snapshot or the new one. A failed
//! cycle leaves the previous snapshot in place.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use roadmap_core::raw::RawBatch;
use roadmap_core::{
    ComputationError, Coverage, CycleId, CycleIssue, EngineConfig, Snapshot, SourceSystem, SyncState, TaskId,
    Time,
};
use roadmap_normalize::normalize_batches;
use roadmap_progress::{aggregate, apply_progress, carry_forward, classify_trend, summarize, BlockerDetector};
use roadmap_storage::SnapshotStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterError, SourceAdapter};

/// Coordinator state plus the error of the latest cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Current state
    pub state: SyncState,

    /// Fatal error of the latest cycle, or its adapter failures
    pub last_sync_error: Option<String>,
}

/// Read-only view handed to the rendering layer.
#[derive(Debug, Clone)]
pub struct SyncView {
    /// Current state
    pub state: SyncState,

    /// Latest published snapshot
    pub snapshot: Arc<Snapshot>,

    /// Fatal error of the latest cycle, or its adapter failures
    pub last_sync_error: Option<String>,
}

/// Result of a single trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// A cycle ran and published a snapshot
    Completed {
        /// Cycle that published
        cycle_id: CycleId,
        /// Backends missing from the snapshot
        adapter_failures: usize,
    },
    /// A cycle was already in flight; nothing ran
    Coalesced,
    /// The cycle failed; the previous snapshot is still served
    Failed(ComputationError),
}

/// Runs sync cycles and publishes snapshots.
pub struct SyncCoordinator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    config: EngineConfig,
    store: Option<Arc<dyn SnapshotStore>>,
    snapshot: watch::Sender<Arc<Snapshot>>,
    status: watch::Sender<SyncStatus>,
    in_flight: AtomicBool,
}

impl SyncCoordinator {
    /// Create a coordinator with no adapters.
    pub fn new(config: EngineConfig) -> Result<Self, ComputationError> {
        config.validate()?;

        let (snapshot, _) = watch::channel(Arc::new(Snapshot::empty()));
        let (status, _) = watch::channel(SyncStatus::default());

        Ok(Self {
            adapters: Vec::new(),
            config,
            store: None,
            snapshot,
            status,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Add a source adapter.
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Add several source adapters.
    pub fn with_adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    /// Persist every published snapshot to `store`.
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current state, snapshot and last error.
    pub fn view(&self) -> SyncView {
        let status = self.status.borrow().clone();
        SyncView {
            state: status.state,
            snapshot: Arc::clone(&self.snapshot.borrow()),
            last_sync_error: status.last_sync_error,
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.status.borrow().state
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    /// Receive every state change.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Publish the snapshot persisted by an earlier run, if any.
    ///
    /// Returns whether a snapshot was restored.
    pub async fn restore(&self) -> roadmap_storage::Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        match store.load_snapshot().await? {
            Some(snapshot) => {
                info!(
                    "Restored snapshot from cycle {}",
                    snapshot.cycle_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into())
                );
                self.snapshot.send_replace(Arc::new(snapshot));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run one cycle now.
    pub async fn trigger(&self) -> TriggerOutcome {
        self.trigger_at(chrono::Utc::now()).await
    }

    /// Run one cycle, evaluating ages and buckets at `now`.
    ///
    /// A trigger arriving while a cycle is in flight is coalesced into it.
    pub async fn trigger_at(&self, now: Time) -> TriggerOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync cycle already in flight, coalescing trigger");
            return TriggerOutcome::Coalesced;
        }
        let _in_flight = InFlight(&self.in_flight);

        let cycle_id = CycleId::new();
        info!("Starting sync cycle {}", cycle_id);
        self.transition(SyncState::Fetching);

        let (batches, failures) = self.fetch_all().await;

        match self.analyze(cycle_id, &batches, failures, now) {
            Ok(snapshot) => {
                let adapter_failures = snapshot.issues.iter().filter(|i| i.is_adapter_failure()).count();
                let last_error = adapter_failure_summary(&snapshot.issues);
                let snapshot = Arc::new(snapshot);

                self.snapshot.send_replace(Arc::clone(&snapshot));
                self.finish(SyncState::Ready, last_error);
                info!(
                    "Sync cycle {} ready: {} tasks, {} features, {} blockers, {} issues",
                    cycle_id,
                    snapshot.tasks.len(),
                    snapshot.features.len(),
                    snapshot.blockers.len(),
                    snapshot.issues.len()
                );

                self.persist(&snapshot).await;
                TriggerOutcome::Completed { cycle_id, adapter_failures }
            }
            Err(e) => {
                error!("Sync cycle {} failed: {}", cycle_id, e);
                self.finish(SyncState::Error, Some(e.to_string()));
                TriggerOutcome::Failed(e)
            }
        }
    }

    /// Fetch from every adapter concurrently, each bounded by the timeout.
    async fn fetch_all(&self) -> (Vec<RawBatch>, Vec<CycleIssue>) {
        let timeout = self.config.sync.adapter_timeout();

        let handles: Vec<(SourceSystem, JoinHandle<Result<RawBatch, AdapterError>>)> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let backend = adapter.backend();
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, adapter.fetch()).await {
                        Ok(result) => result,
                        Err(_) => Err(AdapterError::TimedOut(timeout)),
                    }
                });
                (backend, handle)
            })
            .collect();

        let mut batches = Vec::new();
        let mut failures = Vec::new();
        for (backend, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AdapterError::Other(format!("fetch task failed: {}", e))),
            };
            match result {
                Ok(batch) if batch.backend == backend => {
                    debug!("Fetched {} records from {}", batch.len(), backend);
                    batches.push(batch);
                }
                Ok(batch) => {
                    warn!("{} adapter returned {} data, discarding", backend, batch.backend);
                    failures.push(CycleIssue::AdapterFailure {
                        backend,
                        reason: format!("returned {} data", batch.backend),
                    });
                }
                Err(e) => {
                    warn!("{} adapter failed ({}): {}", backend, e.kind(), e);
                    failures.push(CycleIssue::AdapterFailure { backend, reason: e.to_string() });
                }
            }
        }
        (batches, failures)
    }

    fn analyze(
        &self,
        cycle_id: CycleId,
        batches: &[RawBatch],
        failures: Vec<CycleIssue>,
        now: Time,
    ) -> Result<Snapshot, ComputationError> {
        self.transition(SyncState::Normalizing);
        let normalized = normalize_batches(batches, &self.config.status_mapping)?;

        self.transition(SyncState::Analyzing);
        let rules = &self.config.rules;

        let mut features = normalized.features;
        apply_progress(&mut features, &normalized.tasks, rules.progress_method);

        let blockers = BlockerDetector::new(rules.clone()).detect(&normalized.tasks, &normalized.activities, now);

        let previous = Arc::clone(&self.snapshot.borrow());
        let coverage = coverage_of(&failures);
        let velocity = carry_forward(
            aggregate(
                &normalized.activities,
                &normalized.tasks,
                self.config.velocity.window_size,
                self.config.velocity.bucketing,
                now,
            ),
            &previous.velocity,
            coverage,
        );
        let trend = classify_trend(&velocity, self.config.trend.sample_count, self.config.trend.threshold_slope);

        let summary = summarize(
            &normalized.tasks,
            &normalized.activities,
            normalized.orphan_task_ids.len(),
            &blockers,
            now,
        );

        let mut issues = failures;
        issues.extend(normalized.issues);

        let backends: BTreeSet<SourceSystem> = batches.iter().map(|b| b.backend).collect();

        let snapshot = Snapshot {
            cycle_id: Some(cycle_id),
            completed_at: Some(now),
            backends: backends.into_iter().collect(),
            tasks: normalized.tasks,
            features,
            orphan_task_ids: normalized.orphan_task_ids,
            groupings: normalized.groupings,
            activities: normalized.activities,
            blockers,
            velocity,
            trend,
            summary,
            issues,
        };
        check_invariants(&snapshot)?;
        Ok(snapshot)
    }

    async fn persist(&self, snapshot: &Snapshot) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_snapshot(snapshot).await {
            warn!("Failed to persist snapshot: {}", e);
        }
    }

    fn transition(&self, next: SyncState) {
        self.status.send_modify(|status| move_to(status, next));
    }

    /// Enter a terminal state and record the cycle's error in one update.
    fn finish(&self, next: SyncState, last_sync_error: Option<String>) {
        self.status.send_modify(|status| {
            move_to(status, next);
            status.last_sync_error = last_sync_error;
        });
    }
}

fn move_to(status: &mut SyncStatus, next: SyncState) {
    if !status.state.can_transition_to(next) {
        warn!("Unexpected sync transition {} -> {}", status.state, next);
    }
    debug!("Sync state {} -> {}", status.state, next);
    status.state = next;
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Which halves of the velocity samples this cycle can vouch for.
fn coverage_of(failures: &[CycleIssue]) -> Coverage {
    let failed = |pm: bool| {
        failures.iter().any(|issue| {
            matches!(issue, CycleIssue::AdapterFailure { backend, .. } if backend.is_project_management() == pm)
        })
    };
    Coverage { activity: !failed(false), story_points: !failed(true) }
}

fn adapter_failure_summary(issues: &[CycleIssue]) -> Option<String> {
    let failures: Vec<String> = issues
        .iter()
        .filter(|i| i.is_adapter_failure())
        .map(ToString::to_string)
        .collect();
    (!failures.is_empty()).then(|| failures.join("; "))
}

/// Every task is in exactly one feature or in the orphan list.
fn check_invariants(snapshot: &Snapshot) -> Result<(), ComputationError> {
    let mut grouped: HashSet<&TaskId> = HashSet::new();
    let memberships = snapshot
        .features
        .iter()
        .flat_map(|f| f.task_ids.iter())
        .chain(snapshot.orphan_task_ids.iter());
    for id in memberships {
        if !grouped.insert(id) {
            return Err(ComputationError::Invariant(format!("task {} grouped more than once", id)));
        }
    }
    if grouped.len() != snapshot.tasks.len() {
        return Err(ComputationError::Invariant(format!(
            "grouping covers {} of {} tasks",
            grouped.len(),
            snapshot.tasks.len()
        )));
    }

    if let Some(feature) = snapshot
        .features
        .iter()
        .find(|f| !(0.0..=100.0).contains(&f.progress_percent))
    {
        return Err(ComputationError::Invariant(format!(
            "progress of {} is {}",
            feature.id, feature.progress_percent
        )));
    }
    Ok(())
}
