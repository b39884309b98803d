//! Transition dispatcher
//!
//! Issues one bulk tier-transition request per flushed batch. In dry-run
//! mode no request is sent, but batch accounting is identical so operators
//! can preview the impact of a run.

use super::batch::Batch;
use crate::error::{Result, WalkerError};
use crate::store::ObjectStore;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Sends flushed batches to the store
pub struct TransitionDispatcher {
    store: Arc<dyn ObjectStore>,
    dry_run: bool,
    cancel: CancellationToken,
    batches: AtomicU64,
    objects: AtomicU64,
    largest_batch: AtomicUsize,
}

impl TransitionDispatcher {
    pub fn new(store: Arc<dyn ObjectStore>, dry_run: bool, cancel: CancellationToken) -> Self {
        Self {
            store,
            dry_run,
            cancel,
            batches: AtomicU64::new(0),
            objects: AtomicU64::new(0),
            largest_batch: AtomicUsize::new(0),
        }
    }

    /// Send one batch; empty batches are ignored
    ///
    /// A failed request is returned to the caller and never retried.
    /// Cancellation abandons the request in flight.
    pub async fn dispatch(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        info!(size = count, tier = %batch.target(), "Sending batch of {} items", count);

        if self.dry_run {
            debug!(size = count, "Dry run, batch not sent");
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(WalkerError::Cancelled),
                result = self.store.set_tier(batch.ids(), batch.target().clone()) => result?,
            }
        }

        self.batches.fetch_add(1, Ordering::Relaxed);
        self.objects.fetch_add(count as u64, Ordering::Relaxed);
        self.largest_batch.fetch_max(count, Ordering::Relaxed);
        Ok(())
    }

    /// Batches dispatched (or previewed in dry-run)
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Objects across all dispatched batches
    pub fn batched_objects(&self) -> u64 {
        self.objects.load(Ordering::Relaxed)
    }

    /// Size of the largest dispatched batch
    pub fn largest_batch(&self) -> usize {
        self.largest_batch.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccessTier, MemoryStore, ObjectId, ObjectRecord, StoreFaults};

    fn store_with(n: usize) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(
            (0..n).map(|i| ObjectRecord::archived(format!("o{i}"), 1, None)),
        ))
    }

    fn batch_of(n: usize) -> Batch {
        Batch::new((0..n).map(|i| ObjectId::new(format!("o{i}"))).collect(), AccessTier::Cool)
    }

    #[tokio::test]
    async fn test_dispatch_sends_request() {
        let store = store_with(3);
        let dispatcher = TransitionDispatcher::new(store.clone(), false, CancellationToken::new());

        dispatcher.dispatch(batch_of(3)).await.unwrap();

        assert_eq!(store.set_tier_calls().len(), 1);
        assert_eq!(dispatcher.batches(), 1);
        assert_eq!(dispatcher.batched_objects(), 3);
        assert_eq!(store.record("o2").unwrap().tier, Some(AccessTier::Cool));
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_sending() {
        let store = store_with(3);
        let dispatcher = TransitionDispatcher::new(store.clone(), true, CancellationToken::new());

        dispatcher.dispatch(batch_of(3)).await.unwrap();

        assert!(store.set_tier_calls().is_empty());
        assert_eq!(dispatcher.batches(), 1);
        assert_eq!(dispatcher.batched_objects(), 3);
        assert_eq!(store.record("o2").unwrap().tier, Some(AccessTier::Archive));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = store_with(0);
        let dispatcher = TransitionDispatcher::new(store.clone(), false, CancellationToken::new());

        dispatcher.dispatch(batch_of(0)).await.unwrap();

        assert!(store.set_tier_calls().is_empty());
        assert_eq!(dispatcher.batches(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_surfaced() {
        let store = Arc::new(
            MemoryStore::new(vec![ObjectRecord::archived("o0", 1, None)])
                .with_faults(StoreFaults::default().fail_set_tier_call(1)),
        );
        let dispatcher = TransitionDispatcher::new(store, false, CancellationToken::new());

        let err = dispatcher.dispatch(batch_of(1)).await.unwrap_err();
        assert!(matches!(err, WalkerError::Store(_)));
        assert_eq!(dispatcher.batches(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_dispatch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let dispatcher = TransitionDispatcher::new(store_with(1), false, cancel);

        let err = dispatcher.dispatch(batch_of(1)).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
