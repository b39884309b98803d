//! Object store access module
//!
//! The walker talks to the object store through the [`ObjectStore`] trait:
//! one paginated hierarchical listing call and one bulk tier-transition call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Listing                         │
//! │  - One per traversal unit                            │
//! │  - Fetches one page at a time via continuation      │
//! │  - Never buffers more than a page                   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │               dyn ObjectStore (async)                │
//! │  - list_page(prefix, delimiter, continuation)       │
//! │  - set_tier(ids, tier)                              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! [`MemoryStore`] is the bundled implementation, backed by an inventory file.

pub mod memory;
pub mod types;

pub use memory::{MemoryStore, SetTierCall, StoreFaults};
pub use types::{AccessTier, ListEntry, ListPage, ObjectId, ObjectRecord, RehydrationStatus};

use crate::error::StoreResult;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Delimiter that separates prefix segments
pub const DELIMITER: &str = "/";

/// Largest number of identifiers a single bulk request may carry
pub const MAX_BATCH_REQUEST: usize = 256;

/// Hierarchical object store
///
/// Implementations must be `Send + Sync` for use across traversal units.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists one page of the immediate children of `prefix`.
    ///
    /// Sub-prefixes are returned once each, terminated by `delimiter`.
    /// Pass the previous page's continuation to get the next page.
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: &str,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage>;

    /// Sets the tier of every object in `ids` in one bulk request.
    async fn set_tier(&self, ids: &[ObjectId], tier: AccessTier) -> StoreResult<()>;

    /// Canonical identifier used to address `record` in bulk requests
    fn object_id(&self, record: &ObjectRecord) -> ObjectId;
}

/// Lazy listing of a single prefix
///
/// Pages are fetched on demand; the listing is finished once a page comes
/// back without a continuation token and its entries are consumed.
pub struct Listing<'a> {
    store: &'a dyn ObjectStore,
    prefix: &'a str,
    delimiter: &'a str,
    buffered: VecDeque<ListEntry>,
    continuation: Option<String>,
    exhausted: bool,
    pages: u64,
}

impl<'a> Listing<'a> {
    /// Start a listing of `prefix`; no request is issued until the first entry is pulled
    pub fn new(store: &'a dyn ObjectStore, prefix: &'a str, delimiter: &'a str) -> Self {
        Self {
            store,
            prefix,
            delimiter,
            buffered: VecDeque::new(),
            continuation: None,
            exhausted: false,
            pages: 0,
        }
    }

    /// Next entry, fetching the next page when the buffered one is consumed
    pub async fn next_entry(&mut self) -> StoreResult<Option<ListEntry>> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                return Ok(Some(entry));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .store
                .list_page(self.prefix, self.delimiter, self.continuation.as_deref())
                .await?;
            self.pages += 1;
            self.buffered.extend(page.entries);
            self.exhausted = page.continuation.is_none();
            self.continuation = page.continuation;
        }
    }

    /// Number of pages fetched so far
    pub fn pages(&self) -> u64 {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_spans_pages() {
        let records = (0..7)
            .map(|i| ObjectRecord::new(format!("p/{i}"), 1, Some(AccessTier::Hot)))
            .collect::<Vec<_>>();
        let store = MemoryStore::new(records).with_page_size(3);

        let mut listing = Listing::new(&store, "p/", DELIMITER);
        let mut seen = 0;
        while let Some(entry) = listing.next_entry().await.unwrap() {
            assert!(!entry.is_prefix());
            seen += 1;
        }

        assert_eq!(seen, 7);
        assert_eq!(listing.pages(), 3);
    }

    #[tokio::test]
    async fn test_listing_empty_prefix() {
        let store = MemoryStore::new(Vec::new());
        let mut listing = Listing::new(&store, "", DELIMITER);
        assert!(listing.next_entry().await.unwrap().is_none());
        assert!(listing.next_entry().await.unwrap().is_none());
        assert_eq!(listing.pages(), 1);
    }
}
