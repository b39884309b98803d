//! Tier walk coordinator - concurrent prefix traversal using tokio
//!
//! The coordinator seeds one traversal unit at the starting prefix and runs
//! a dispatch loop that spawns every unit registered afterwards. Each unit:
//!
//! 1. waits for a slot from the concurrency limiter (a semaphore sized to
//!    the worker count)
//! 2. pages through the listing of its prefix
//! 3. registers a new unit for every sub-prefix, classifies and counts every
//!    object, and feeds eligible objects to its own batch accumulator
//! 4. drains the accumulator, releases its slot and is marked finished
//!
//! The dispatch loop also ticks on the status interval: it reports progress
//! and polls the registry until the walk has converged.
//!
//! Any unit failure is recorded as the run's error and cancels the whole run.

use super::batch::BatchAccumulator;
use super::classify::classify_record;
use super::dispatch::TransitionDispatcher;
use super::registry::{ConvergenceCheck, UnitId, UnitRegistry};
use super::stats::{StatsSnapshot, TierStats};
use crate::config::WalkConfig;
use crate::error::{Result, WalkerError};
use crate::store::{ListEntry, Listing, ObjectStore, DELIMITER};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// How the dispatch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Every registered unit finished
    Completed,
    /// The run was cancelled before converging
    Cancelled,
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct WalkProgress {
    pub stats: StatsSnapshot,
    pub units_registered: usize,
    pub units_finished: usize,
    pub active_units: usize,
    pub total_workers: usize,
    pub batches: u64,
    pub batched_objects: u64,
    pub elapsed: Duration,
}

impl WalkProgress {
    /// Prefixes finished per second
    pub fn prefixes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.units_finished as f64 / secs
        } else {
            0.0
        }
    }
}

/// Result of a tier walk
#[derive(Debug, Clone)]
pub struct TierWalkResult {
    pub stats: StatsSnapshot,
    pub units_registered: usize,
    pub units_finished: usize,
    pub batches: u64,
    pub batched_objects: u64,
    pub largest_batch: usize,
    pub peak_active_units: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcome: WalkOutcome,
}

impl TierWalkResult {
    pub fn completed(&self) -> bool {
        self.outcome == WalkOutcome::Completed
    }
}

/// A registered unit waiting to be spawned
#[derive(Debug)]
struct PendingUnit {
    id: UnitId,
    prefix: String,
}

/// State shared by every traversal unit of a run
struct WalkShared {
    store: Arc<dyn ObjectStore>,
    stats: Arc<TierStats>,
    registry: Arc<UnitRegistry>,
    dispatcher: TransitionDispatcher,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
    active_units: AtomicUsize,
    peak_active_units: AtomicUsize,
    failure: Mutex<Option<WalkerError>>,
    run_span: Span,
}

impl WalkShared {
    /// Keep the first failure and stop the run
    fn record_failure(&self, err: WalkerError) {
        {
            let mut failure = self.failure.lock();
            if failure.is_none() {
                *failure = Some(err);
            }
        }
        self.cancel.cancel();
    }
}

/// Tier walk coordinator
pub struct TierWalkCoordinator {
    config: Arc<WalkConfig>,
    shared: Arc<WalkShared>,
}

impl TierWalkCoordinator {
    /// Create a coordinator; cancelling `cancel` stops the run
    pub fn new(config: WalkConfig, store: Arc<dyn ObjectStore>, cancel: CancellationToken) -> Self {
        let run_cancel = cancel.child_token();
        let worker_count = config.worker_count.max(1);
        let run_span = info_span!("run", run_id = %config.run_id);

        let shared = Arc::new(WalkShared {
            dispatcher: TransitionDispatcher::new(
                Arc::clone(&store),
                config.dry_run,
                run_cancel.clone(),
            ),
            store,
            stats: Arc::new(TierStats::new()),
            registry: Arc::new(UnitRegistry::new()),
            limiter: Arc::new(Semaphore::new(worker_count)),
            cancel: run_cancel,
            active_units: AtomicUsize::new(0),
            peak_active_units: AtomicUsize::new(0),
            failure: Mutex::new(None),
            run_span,
        });

        Self {
            config: Arc::new(config),
            shared,
        }
    }

    /// Shared counters, readable while and after the walk runs
    pub fn stats(&self) -> Arc<TierStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Unit registry of this run
    pub fn registry(&self) -> Arc<UnitRegistry> {
        Arc::clone(&self.shared.registry)
    }

    /// Token that cancels this run only
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Current progress
    pub fn progress(&self, elapsed: Duration) -> WalkProgress {
        let shared = &self.shared;
        WalkProgress {
            stats: shared.stats.snapshot(),
            units_registered: shared.registry.registered(),
            units_finished: shared.registry.finished(),
            active_units: shared.active_units.load(Ordering::Relaxed),
            total_workers: self.config.worker_count,
            batches: shared.dispatcher.batches(),
            batched_objects: shared.dispatcher.batched_objects(),
            elapsed,
        }
    }

    /// Run the walk to convergence, cancellation or first failure
    pub async fn run(&self) -> Result<TierWalkResult> {
        self.run_with_progress(|_| {}).await
    }

    /// Run the walk, calling `on_status` on every status tick
    pub async fn run_with_progress<F>(&self, mut on_status: F) -> Result<TierWalkResult>
    where
        F: FnMut(&WalkProgress),
    {
        let start = Instant::now();
        let started_at = Utc::now();
        let shared = &self.shared;

        {
            let _enter = shared.run_span.enter();
            info!(
                prefix = %self.config.prefix,
                workers = self.config.worker_count,
                dry_run = self.config.dry_run,
                started_at = %started_at.to_rfc3339(),
                "Starting tier walk"
            );
        }

        let (unit_tx, mut unit_rx) = mpsc::unbounded_channel::<PendingUnit>();

        let root = PendingUnit {
            id: shared.registry.register(&self.config.prefix),
            prefix: self.config.prefix.clone(),
        };
        spawn_unit(shared, &unit_tx, root);

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.status_interval,
            self.config.status_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut convergence = ConvergenceCheck::new();

        let outcome = loop {
            tokio::select! {
                _ = shared.cancel.cancelled() => break WalkOutcome::Cancelled,
                Some(unit) = unit_rx.recv() => spawn_unit(shared, &unit_tx, unit),
                _ = ticker.tick() => {
                    let progress = self.progress(start.elapsed());
                    on_status(&progress);
                    debug!(
                        registered = progress.units_registered,
                        finished = progress.units_finished,
                        in_flight = ?shared.registry.unfinished_prefixes(4),
                        "Completion check"
                    );
                    if convergence.observe(&shared.registry) {
                        break WalkOutcome::Completed;
                    }
                }
            }
        };

        if let Some(err) = shared.failure.lock().take() {
            error!(error = %err, "Tier walk aborted");
            return Err(err);
        }

        let result = TierWalkResult {
            stats: shared.stats.snapshot(),
            units_registered: shared.registry.registered(),
            units_finished: shared.registry.finished(),
            batches: shared.dispatcher.batches(),
            batched_objects: shared.dispatcher.batched_objects(),
            largest_batch: shared.dispatcher.largest_batch(),
            peak_active_units: shared.peak_active_units.load(Ordering::SeqCst),
            started_at,
            duration: start.elapsed(),
            outcome,
        };

        match outcome {
            WalkOutcome::Completed => info!(
                prefixes = result.units_registered,
                batches = result.batches,
                duration_secs = result.duration.as_secs(),
                "Done!"
            ),
            WalkOutcome::Cancelled => info!(
                prefixes_finished = result.units_finished,
                prefixes_registered = result.units_registered,
                "Operation cancelled"
            ),
        }

        Ok(result)
    }
}

/// Marks a unit finished when its task ends; a panic aborts the run
struct FinishGuard {
    shared: Arc<WalkShared>,
    id: UnitId,
    prefix: String,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared.record_failure(WalkerError::UnitAborted {
                prefix: std::mem::take(&mut self.prefix),
                reason: "task panicked".to_string(),
            });
        }
        self.shared.registry.mark_finished(self.id);
    }
}

/// Counts a unit as holding a limiter slot until dropped
struct ActiveSlot<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveSlot<'a> {
    fn enter(shared: &'a WalkShared) -> Self {
        let now = shared.active_units.fetch_add(1, Ordering::SeqCst) + 1;
        shared.peak_active_units.fetch_max(now, Ordering::SeqCst);
        Self {
            active: &shared.active_units,
        }
    }
}

impl Drop for ActiveSlot<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Launch a registered unit as an independent task
fn spawn_unit(shared: &Arc<WalkShared>, unit_tx: &mpsc::UnboundedSender<PendingUnit>, unit: PendingUnit) {
    let shared = Arc::clone(shared);
    let unit_tx = unit_tx.clone();
    let span = info_span!(parent: &shared.run_span, "unit", prefix = %unit.prefix);

    tokio::spawn(
        async move {
            let prefix = unit.prefix.clone();
            let _finish = FinishGuard {
                shared: Arc::clone(&shared),
                id: unit.id,
                prefix: prefix.clone(),
            };

            match process_unit(&shared, &unit_tx, unit).await {
                Ok(()) => {}
                Err(WalkerError::Cancelled) => debug!("Unit cancelled"),
                Err(WalkerError::Store(e)) if e.is_transient() => {
                    warn!(prefix = %prefix, error = %e, "Transient store error, unit aborted");
                    shared.record_failure(WalkerError::Store(e));
                }
                Err(e) => {
                    error!(prefix = %prefix, error = %e, "Unit failed");
                    shared.record_failure(e);
                }
            }
        }
        .instrument(span),
    );
}

/// Walk the immediate children of one prefix
async fn process_unit(
    shared: &WalkShared,
    unit_tx: &mpsc::UnboundedSender<PendingUnit>,
    unit: PendingUnit,
) -> Result<()> {
    let permit = tokio::select! {
        biased;
        _ = shared.cancel.cancelled() => return Err(WalkerError::Cancelled),
        permit = Arc::clone(&shared.limiter).acquire_owned() => {
            permit.map_err(|_| WalkerError::Cancelled)?
        }
    };
    let slot = ActiveSlot::enter(shared);
    shared.registry.mark_running(unit.id);

    debug!(prefix = %unit.prefix, "Processing prefix");

    let mut listing = Listing::new(shared.store.as_ref(), &unit.prefix, DELIMITER);
    let mut batch = BatchAccumulator::new(&shared.dispatcher);
    let mut objects = 0u64;
    let mut children = 0u64;

    loop {
        let entry = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return Err(WalkerError::Cancelled),
            entry = listing.next_entry() => entry?,
        };

        match entry {
            None => break,
            Some(ListEntry::Prefix(child)) => {
                let id = shared.registry.register(&child);
                children += 1;
                if unit_tx.send(PendingUnit { id, prefix: child }).is_err() {
                    // Dispatch loop is gone; nothing will run the child
                    shared.registry.mark_finished(id);
                    return Err(WalkerError::Cancelled);
                }
            }
            Some(ListEntry::Object(record)) => {
                let classification = classify_record(&record);
                shared.stats.record(&classification, record.size);
                objects += 1;

                if classification.eligible {
                    batch.add(shared.store.object_id(&record)).await?;
                }
            }
        }
    }

    let flushed = batch.drain().await?;
    drop(slot);
    drop(permit);

    debug!(
        prefix = %unit.prefix,
        objects = objects,
        children = children,
        batches = flushed,
        pages = listing.pages(),
        "Prefix complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccessTier, MemoryStore, ObjectRecord};
    use crate::walker::classify::TierBucket;

    fn test_config(workers: usize) -> WalkConfig {
        WalkConfig {
            worker_count: workers,
            status_interval: Duration::from_millis(5),
            ..WalkConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_walks_nested_prefixes() {
        let store = Arc::new(MemoryStore::new(vec![
            ObjectRecord::new("a/b/c/one", 1, Some(AccessTier::Hot)),
            ObjectRecord::new("a/b/two", 2, Some(AccessTier::Cool)),
            ObjectRecord::new("a/three", 4, None),
            ObjectRecord::new("four", 8, Some(AccessTier::Hot)),
        ]));
        let coordinator = TierWalkCoordinator::new(test_config(2), store, CancellationToken::new());

        let result = coordinator.run().await.unwrap();

        assert!(result.completed());
        assert_eq!(result.units_registered, 4);
        assert_eq!(result.units_finished, 4);
        assert_eq!(result.stats.get(TierBucket::Total).count, 4);
        assert_eq!(result.stats.get(TierBucket::Total).bytes, 15);
        assert_eq!(result.batches, 0);
    }

    #[tokio::test]
    async fn test_empty_namespace_converges() {
        let store = Arc::new(MemoryStore::new(Vec::new()));
        let coordinator = TierWalkCoordinator::new(test_config(1), store, CancellationToken::new());

        let result = coordinator.run().await.unwrap();
        assert!(result.completed());
        assert_eq!(result.units_registered, 1);
        assert_eq!(result.stats.get(TierBucket::Total).count, 0);
    }

    #[tokio::test]
    async fn test_start_prefix_limits_walk() {
        let store = Arc::new(MemoryStore::new(vec![
            ObjectRecord::new("keep/x", 1, Some(AccessTier::Hot)),
            ObjectRecord::new("skip/y", 1, Some(AccessTier::Hot)),
        ]));
        let config = WalkConfig {
            prefix: "keep/".to_string(),
            ..test_config(2)
        };
        let coordinator = TierWalkCoordinator::new(config, store, CancellationToken::new());

        let result = coordinator.run().await.unwrap();
        assert_eq!(result.stats.get(TierBucket::Total).count, 1);
        assert_eq!(result.units_registered, 1);
    }

    struct PanickingStore;

    #[async_trait::async_trait]
    impl ObjectStore for PanickingStore {
        async fn list_page(
            &self,
            _prefix: &str,
            _delimiter: &str,
            _continuation: Option<&str>,
        ) -> crate::error::StoreResult<crate::store::ListPage> {
            panic!("listing blew up");
        }

        async fn set_tier(
            &self,
            _ids: &[crate::store::ObjectId],
            _tier: AccessTier,
        ) -> crate::error::StoreResult<()> {
            Ok(())
        }

        fn object_id(&self, record: &ObjectRecord) -> crate::store::ObjectId {
            crate::store::ObjectId::new(record.path.clone())
        }
    }

    #[tokio::test]
    async fn test_panicking_unit_aborts_run() {
        let coordinator = TierWalkCoordinator::new(
            test_config(1),
            Arc::new(PanickingStore),
            CancellationToken::new(),
        );

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, WalkerError::UnitAborted { .. }));
        assert_eq!(coordinator.registry().finished(), 1);
    }
}
