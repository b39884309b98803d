//! Per-unit batch accumulation
//!
//! Each traversal unit owns one [`BatchAccumulator`]; nothing is shared
//! between units. Eligible identifiers are buffered until the batch reaches
//! [`BATCH_CAPACITY`], then handed to the dispatcher. Draining consumes the
//! accumulator, so a closed accumulator cannot be added to.

use super::dispatch::TransitionDispatcher;
use crate::error::Result;
use crate::store::{AccessTier, ObjectId};

/// Identifiers per bulk tier-transition request
pub const BATCH_CAPACITY: usize = 250;

/// Tier that eligible archived objects are moved to
pub const TARGET_TIER: AccessTier = AccessTier::Cool;

/// Identifiers bound for one bulk request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    ids: Vec<ObjectId>,
    target: AccessTier,
}

impl Batch {
    pub fn new(ids: Vec<ObjectId>, target: AccessTier) -> Self {
        Self { ids, target }
    }

    pub fn ids(&self) -> &[ObjectId] {
        &self.ids
    }

    pub fn target(&self) -> &AccessTier {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Buffer of eligible identifiers owned by a single traversal unit
pub struct BatchAccumulator<'a> {
    dispatcher: &'a TransitionDispatcher,
    pending: Vec<ObjectId>,
    capacity: usize,
    flushed: u64,
}

impl<'a> BatchAccumulator<'a> {
    pub fn new(dispatcher: &'a TransitionDispatcher) -> Self {
        Self::with_capacity(dispatcher, BATCH_CAPACITY)
    }

    /// Accumulator flushing at `capacity` items (at least 1)
    pub fn with_capacity(dispatcher: &'a TransitionDispatcher, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            dispatcher,
            pending: Vec::with_capacity(capacity),
            capacity,
            flushed: 0,
        }
    }

    /// Append an identifier, flushing when the batch is full
    pub async fn add(&mut self, id: ObjectId) -> Result<()> {
        self.pending.push(id);
        if self.pending.len() >= self.capacity {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush the trailing partial batch and close the accumulator
    ///
    /// Returns the number of batches this accumulator flushed in total.
    pub async fn drain(mut self) -> Result<u64> {
        self.flush().await?;
        Ok(self.flushed)
    }

    /// Number of identifiers waiting for the next flush
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let ids = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        self.dispatcher.dispatch(Batch::new(ids, TARGET_TIER)).await?;
        self.flushed += 1;
        Ok(())
    }
}
