//! tier-walker - Concurrent Object-Store Tier Scanner
//!
//! A tool for inventorying the storage tiers of object-store namespaces
//! holding billions of objects, and moving archived objects that are not
//! being rehydrated to the cool tier with bulk requests instead of
//! per-object calls.
//!
//! # Features
//!
//! - **Parallel Traversal**: Every sub-prefix becomes its own traversal
//!   unit; a semaphore bounds how many list at once.
//!
//! - **Streaming Listings**: Prefixes are listed page by page; no subtree is
//!   ever buffered in memory.
//!
//! - **Batched Transitions**: Eligible objects are grouped into batches of
//!   250 per unit and sent as one bulk tier request each.
//!
//! - **Dry Run**: Counts and batches exactly as a real run would, without
//!   changing anything.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Object Store                              │
//! │              (list_page / set_tier via ObjectStore)              │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               │ hierarchical listing
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Traversal Units (tokio)                      │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │ prefix  │  │ prefix  │  │ prefix  │  ...    │ prefix  │     │
//! │  │  a/     │  │  a/b/   │  │  c/     │         │  n/     │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       │  sub-prefixes registered as new units      │          │
//! │       └────────────┼────────────┼────────────────────┘          │
//! │                    ▼            ▼                               │
//! │            ┌──────────────────────────┐                         │
//! │            │  TierStats (atomics)     │                         │
//! │            │  UnitRegistry (append)   │                         │
//! │            └──────────────────────────┘                         │
//! │                         │                                       │
//! │                         ▼                                       │
//! │            ┌──────────────────────────┐                         │
//! │            │   TransitionDispatcher   │                         │
//! │            │  - 250 ids per request   │                         │
//! │            │  - archive → cool        │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Preview what would move
//! tier-walker --inventory objects.jsonl --dry-run
//!
//! # Move settled archive objects under one prefix with 64 units
//! tier-walker --inventory objects.jsonl --prefix logs/2019 -w 64
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod store;
pub mod walker;

pub use config::{CliArgs, WalkConfig};
pub use error::{Result, WalkerError};
pub use store::{MemoryStore, ObjectStore};
pub use walker::{TierWalkCoordinator, TierWalkResult, WalkOutcome};
