//! Concurrent tier walker
//!
//! This module implements the prefix traversal that classifies every object
//! and batches archive-to-cool transitions.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────────────┐
//!                     │   TierWalkCoordinator    │
//!                     │  - dispatch loop         │
//!                     │  - status / completion   │
//!                     └────────────┬─────────────┘
//!                                  │ spawn
//!       ┌──────────────────────────┼──────────────────────────┐
//!       │                          │                          │
//! ┌─────▼──────┐             ┌─────▼──────┐             ┌─────▼──────┐
//! │   Unit a/  │             │   Unit b/  │             │   Unit n/  │
//! │  list page │             │  list page │             │  list page │
//! │  classify  │             │  classify  │             │  classify  │
//! │  batch(250)│             │  batch(250)│             │  batch(250)│
//! └─────┬──────┘             └─────┬──────┘             └─────┬──────┘
//!       │        TierStats (atomics) + UnitRegistry           │
//!       └──────────────────────────┼──────────────────────────┘
//!                                  ▼
//!                      TransitionDispatcher → set_tier
//! ```

pub mod batch;
pub mod classify;
pub mod coordinator;
pub mod dispatch;
pub mod registry;
pub mod stats;

pub use batch::{Batch, BatchAccumulator, BATCH_CAPACITY, TARGET_TIER};
pub use classify::{classify, classify_record, Classification, TierBucket};
pub use coordinator::{TierWalkCoordinator, TierWalkResult, WalkOutcome, WalkProgress};
pub use dispatch::TransitionDispatcher;
pub use registry::{ConvergenceCheck, UnitId, UnitRegistry, UnitState};
pub use stats::{bytes_to_tib, BucketTotals, StatsSnapshot, TierStats};
