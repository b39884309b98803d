//! In-memory object store
//!
//! Holds a namespace of object records keyed by full path and answers
//! hierarchical listings by splitting paths on the delimiter. Backs the CLI
//! through JSON-lines inventory files and doubles as the test store: it can
//! inject listing/batch failures and latency, records every bulk request,
//! and tracks how many listings run at once.

use super::types::{AccessTier, ListEntry, ListPage, ObjectId, ObjectRecord};
use super::{ObjectStore, MAX_BATCH_REQUEST};
use crate::error::{Result, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default number of entries per listing page
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Fault injection and latency settings
#[derive(Debug, Clone, Default)]
pub struct StoreFaults {
    /// Prefixes whose listing fails
    pub fail_list_prefixes: HashSet<String>,

    /// Prefixes whose listing is rejected as throttled
    pub throttle_list_prefixes: HashSet<String>,

    /// 1-based number of the set-tier call that fails
    pub fail_set_tier_call: Option<usize>,

    /// Delay applied to every listing page
    pub list_latency: Option<Duration>,

    /// Delay applied to every set-tier call
    pub set_tier_latency: Option<Duration>,
}

impl StoreFaults {
    /// Make listing of `prefix` fail
    pub fn fail_listing(mut self, prefix: impl Into<String>) -> Self {
        self.fail_list_prefixes.insert(prefix.into());
        self
    }

    /// Make listing of `prefix` come back throttled
    pub fn throttle_listing(mut self, prefix: impl Into<String>) -> Self {
        self.throttle_list_prefixes.insert(prefix.into());
        self
    }

    /// Make the `n`-th set-tier call fail (1-based)
    pub fn fail_set_tier_call(mut self, n: usize) -> Self {
        self.fail_set_tier_call = Some(n);
        self
    }

    /// Delay every listing page by `latency`
    pub fn list_latency(mut self, latency: Duration) -> Self {
        self.list_latency = Some(latency);
        self
    }

    /// Delay every set-tier call by `latency`
    pub fn set_tier_latency(mut self, latency: Duration) -> Self {
        self.set_tier_latency = Some(latency);
        self
    }
}

/// A recorded bulk tier-transition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetTierCall {
    pub ids: Vec<ObjectId>,
    pub tier: AccessTier,
}

/// In-memory hierarchical object store
#[derive(Debug)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, ObjectRecord>>,
    page_size: usize,
    faults: Mutex<StoreFaults>,
    set_tier_calls: Mutex<Vec<SetTierCall>>,
    list_calls: AtomicU64,
    active_listings: AtomicUsize,
    peak_listings: AtomicUsize,
}

impl MemoryStore {
    /// Create a store holding `records`; later records win on duplicate paths
    pub fn new(records: impl IntoIterator<Item = ObjectRecord>) -> Self {
        let objects = records
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();

        Self {
            objects: RwLock::new(objects),
            page_size: DEFAULT_PAGE_SIZE,
            faults: Mutex::new(StoreFaults::default()),
            set_tier_calls: Mutex::new(Vec::new()),
            list_calls: AtomicU64::new(0),
            active_listings: AtomicUsize::new(0),
            peak_listings: AtomicUsize::new(0),
        }
    }

    /// Set the listing page size (at least 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Install fault injection settings
    pub fn with_faults(self, faults: StoreFaults) -> Self {
        *self.faults.lock() = faults;
        self
    }

    /// Load a store from a JSON-lines inventory file
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn load_inventory(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let record: ObjectRecord =
                serde_json::from_str(line).map_err(|e| StoreError::InvalidInventory {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            records.push(record);
        }

        debug!(path = %path.display(), objects = records.len(), "Loaded inventory");
        Ok(Self::new(records))
    }

    /// Write every record back as JSON lines, replacing `path` atomically
    ///
    /// The records are staged in `<path>.tmp` next to the inventory.
    pub fn save_inventory(&self, path: &Path) -> Result<usize> {
        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        let objects = self.objects.read();

        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for record in objects.values() {
                serde_json::to_writer(&mut writer, record).map_err(std::io::Error::from)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        std::fs::rename(&tmp_path, path)?;
        Ok(objects.len())
    }

    /// Current record stored at `path`
    pub fn record(&self, path: &str) -> Option<ObjectRecord> {
        self.objects.read().get(path).cloned()
    }

    /// Number of objects in the store
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Check if the store holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Every set-tier request issued so far, in arrival order
    pub fn set_tier_calls(&self) -> Vec<SetTierCall> {
        self.set_tier_calls.lock().clone()
    }

    /// Number of listing pages served
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Highest number of listing requests that were in progress at once
    pub fn peak_concurrent_listings(&self) -> usize {
        self.peak_listings.load(Ordering::SeqCst)
    }
}

/// Counts a listing request as in progress until dropped
struct ListingGauge<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ListingGauge<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ListingGauge<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: &str,
        continuation: Option<&str>,
    ) -> StoreResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let _gauge = ListingGauge::enter(&self.active_listings, &self.peak_listings);

        let (latency, fail, throttle) = {
            let faults = self.faults.lock();
            (
                faults.list_latency,
                faults.fail_list_prefixes.contains(prefix),
                faults.throttle_list_prefixes.contains(prefix),
            )
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if fail {
            return Err(StoreError::ListFailed {
                prefix: prefix.to_string(),
                reason: "injected listing failure".to_string(),
            });
        }

        if throttle {
            return Err(StoreError::Throttled {
                prefix: prefix.to_string(),
                reason: "request rate exceeded".to_string(),
            });
        }

        if let Some(token) = continuation {
            if !token.starts_with(prefix) {
                return Err(StoreError::InvalidContinuation {
                    token: token.to_string(),
                });
            }
        }

        let objects = self.objects.read();
        Ok(page_of(&objects, prefix, delimiter, continuation, self.page_size))
    }

    async fn set_tier(&self, ids: &[ObjectId], tier: AccessTier) -> StoreResult<()> {
        let (call_number, latency, fail_at) = {
            let mut calls = self.set_tier_calls.lock();
            calls.push(SetTierCall {
                ids: ids.to_vec(),
                tier: tier.clone(),
            });
            let faults = self.faults.lock();
            (calls.len(), faults.set_tier_latency, faults.fail_set_tier_call)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if fail_at == Some(call_number) {
            return Err(StoreError::SetTierFailed {
                count: ids.len(),
                reason: "injected batch failure".to_string(),
            });
        }

        if ids.len() > MAX_BATCH_REQUEST {
            return Err(StoreError::BatchTooLarge {
                count: ids.len(),
                max: MAX_BATCH_REQUEST,
            });
        }

        let mut objects = self.objects.write();

        // The request is all-or-nothing from the caller's side
        if let Some(missing) = ids.iter().find(|id| !objects.contains_key(id.as_str())) {
            return Err(StoreError::NotFound {
                id: missing.to_string(),
            });
        }

        for id in ids {
            if let Some(record) = objects.get_mut(id.as_str()) {
                record.tier = Some(tier.clone());
                record.rehydration = None;
            }
        }

        Ok(())
    }

    fn object_id(&self, record: &ObjectRecord) -> ObjectId {
        ObjectId::new(record.path.clone())
    }
}

/// Build one listing page of the immediate children of `prefix`
///
/// The continuation token is the key of the last object returned, or the
/// last sub-prefix returned (in which case every key under it is skipped).
fn page_of(
    objects: &BTreeMap<String, ObjectRecord>,
    prefix: &str,
    delimiter: &str,
    continuation: Option<&str>,
    page_size: usize,
) -> ListPage {
    let start = match continuation {
        Some(token) => Bound::Excluded(token),
        None => Bound::Included(prefix),
    };

    let mut open_prefix: Option<String> = continuation
        .filter(|token| token.len() > prefix.len() && token.ends_with(delimiter))
        .map(str::to_string);

    let mut entries = Vec::new();
    let mut last_token: Option<String> = None;

    for (key, record) in objects.range::<str, _>((start, Bound::Unbounded)) {
        if !key.starts_with(prefix) {
            break;
        }
        if let Some(open) = &open_prefix {
            if key.starts_with(open.as_str()) {
                continue;
            }
        }

        let rest = &key[prefix.len()..];
        let split = if delimiter.is_empty() {
            None
        } else {
            rest.find(delimiter)
        };

        let (entry, token) = match split {
            Some(idx) => {
                let sub = format!("{}{}", prefix, &rest[..idx + delimiter.len()]);
                open_prefix = Some(sub.clone());
                (ListEntry::Prefix(sub.clone()), sub)
            }
            None => (ListEntry::Object(record.clone()), key.clone()),
        };

        if entries.len() == page_size {
            return ListPage {
                entries,
                continuation: last_token,
            };
        }

        entries.push(entry);
        last_token = Some(token);
    }

    ListPage {
        entries,
        continuation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RehydrationStatus, DELIMITER};
    use tempfile::tempdir;

    fn sample_store() -> MemoryStore {
        MemoryStore::new(vec![
            ObjectRecord::new("root.txt", 10, Some(AccessTier::Hot)),
            ObjectRecord::new("a/one.bin", 20, Some(AccessTier::Cool)),
            ObjectRecord::new("a/two.bin", 30, Some(AccessTier::Cool)),
            ObjectRecord::new("a/deep/three.bin", 40, None),
            ObjectRecord::new("a-side.bin", 50, Some(AccessTier::Hot)),
            ObjectRecord::archived("b/c/d/e.bin", 60, None),
        ])
    }

    fn names(page: &ListPage) -> Vec<String> {
        page.entries
            .iter()
            .map(|e| match e {
                ListEntry::Prefix(p) => p.clone(),
                ListEntry::Object(o) => o.path.clone(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_list_root() {
        let store = sample_store();
        let page = store.list_page("", DELIMITER, None).await.unwrap();
        assert_eq!(names(&page), vec!["a-side.bin", "a/", "b/", "root.txt"]);
        assert!(page.continuation.is_none());
    }

    #[tokio::test]
    async fn test_list_nested_prefix() {
        let store = sample_store();
        let page = store.list_page("a/", DELIMITER, None).await.unwrap();
        assert_eq!(names(&page), vec!["a/deep/", "a/one.bin", "a/two.bin"]);

        let page = store.list_page("b/", DELIMITER, None).await.unwrap();
        assert_eq!(names(&page), vec!["b/c/"]);
    }

    #[tokio::test]
    async fn test_pagination_skips_listed_prefix() {
        let store = sample_store().with_page_size(2);

        let first = store.list_page("", DELIMITER, None).await.unwrap();
        assert_eq!(names(&first), vec!["a-side.bin", "a/"]);
        assert_eq!(first.continuation.as_deref(), Some("a/"));

        let second = store
            .list_page("", DELIMITER, first.continuation.as_deref())
            .await
            .unwrap();
        assert_eq!(names(&second), vec!["b/", "root.txt"]);
        assert!(second.continuation.is_none());
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_continuation() {
        let store = sample_store();
        let err = store.list_page("a/", DELIMITER, Some("zzz")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidContinuation { .. }));
    }

    #[tokio::test]
    async fn test_set_tier_updates_records() {
        let store = MemoryStore::new(vec![ObjectRecord::archived(
            "x.bin",
            5,
            Some(RehydrationStatus::PendingToHot),
        )]);
        let id = store.object_id(&store.record("x.bin").unwrap());

        store.set_tier(&[id.clone()], AccessTier::Cool).await.unwrap();

        let record = store.record("x.bin").unwrap();
        assert_eq!(record.tier, Some(AccessTier::Cool));
        assert_eq!(record.rehydration, None);
        assert_eq!(store.set_tier_calls().len(), 1);
        assert_eq!(store.set_tier_calls()[0].ids, vec![id]);
    }

    #[tokio::test]
    async fn test_set_tier_unknown_id_changes_nothing() {
        let store = MemoryStore::new(vec![ObjectRecord::archived("x.bin", 5, None)]);
        let ids = vec![ObjectId::new("x.bin"), ObjectId::new("missing.bin")];

        let err = store.set_tier(&ids, AccessTier::Cool).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.record("x.bin").unwrap().tier, Some(AccessTier::Archive));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = sample_store().with_faults(
            StoreFaults::default()
                .fail_listing("a/")
                .fail_set_tier_call(2),
        );

        assert!(store.list_page("a/", DELIMITER, None).await.is_err());
        assert!(store.list_page("b/", DELIMITER, None).await.is_ok());

        let ids = vec![ObjectId::new("root.txt")];
        assert!(store.set_tier(&ids, AccessTier::Cool).await.is_ok());
        assert!(store.set_tier(&ids, AccessTier::Cool).await.is_err());
        assert!(store.set_tier(&ids, AccessTier::Cool).await.is_ok());
    }

    #[tokio::test]
    async fn test_throttled_listing_is_transient() {
        let store = sample_store().with_faults(StoreFaults::default().throttle_listing("b/"));

        let err = store.list_page("b/", DELIMITER, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Throttled { ref prefix, .. } if prefix == "b/"));
        assert!(err.is_transient());
        assert!(store.list_page("a/", DELIMITER, None).await.is_ok());
    }

    #[test]
    fn test_inventory_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inventory.jsonl");
        std::fs::write(
            &path,
            "# exported inventory\n\
             {\"path\":\"a/x.bin\",\"size\":7,\"tier\":\"Archive\"}\n\
             \n\
             {\"path\":\"b.bin\",\"size\":3,\"tier\":\"Hot\"}\n",
        )
        .unwrap();

        let store = MemoryStore::load_inventory(&path).unwrap();
        assert_eq!(store.len(), 2);

        assert_eq!(store.save_inventory(&path).unwrap(), 2);
        let reloaded = MemoryStore::load_inventory(&path).unwrap();
        assert_eq!(reloaded.record("a/x.bin"), store.record("a/x.bin"));
    }

    #[test]
    fn test_save_leaves_sibling_files_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("objects.jsonl");
        let sibling = dir.path().join("objects.tmp");
        std::fs::write(&sibling, "keep me").unwrap();

        let store = MemoryStore::new(vec![ObjectRecord::archived("a.bin", 1, None)]);
        assert_eq!(store.save_inventory(&path).unwrap(), 1);

        assert_eq!(std::fs::read_to_string(&sibling).unwrap(), "keep me");
        assert!(!dir.path().join("objects.jsonl.tmp").exists());
        assert_eq!(MemoryStore::load_inventory(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_save_inventory_named_tmp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.tmp");

        let store = MemoryStore::new(vec![
            ObjectRecord::archived("a.bin", 1, None),
            ObjectRecord::new("b.bin", 2, Some(AccessTier::Hot)),
        ]);
        assert_eq!(store.save_inventory(&path).unwrap(), 2);

        let reloaded = MemoryStore::load_inventory(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.record("b.bin"), store.record("b.bin"));
    }

    #[test]
    fn test_inventory_reports_bad_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"path\":\"ok\"}\nnot json\n").unwrap();

        let err = MemoryStore::load_inventory(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 2"), "{message}");
    }
}
