//! Tier statistics aggregation
//!
//! One (count, bytes) pair of atomics per bucket. Every traversal unit
//! increments the same instance; fields are updated independently with
//! `fetch_add`, so each field reflects every increment exactly once.

use super::classify::{Classification, TierBucket};
use std::sync::atomic::{AtomicU64, Ordering};

/// Bytes per tebibyte
const BYTES_PER_TIB: f64 = (1u64 << 40) as f64;

/// Convert a byte count to tebibytes
pub fn bytes_to_tib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_TIB
}

/// Shared, concurrently-updated tier counters
#[derive(Debug, Default)]
pub struct TierStats {
    counts: [AtomicU64; TierBucket::COUNT],
    bytes: [AtomicU64; TierBucket::COUNT],
}

impl TierStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one object of `bytes` size in `bucket`
    pub fn increment(&self, bucket: TierBucket, bytes: u64) {
        let i = bucket.index();
        self.counts[i].fetch_add(1, Ordering::Relaxed);
        self.bytes[i].fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count one object in every bucket of its classification
    pub fn record(&self, classification: &Classification, bytes: u64) {
        for bucket in classification.buckets {
            self.increment(*bucket, bytes);
        }
    }

    /// Current values of all buckets
    ///
    /// Buckets are read one after another, so the snapshot is not an
    /// instant across buckets while units are still running.
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut buckets = [BucketTotals::default(); TierBucket::COUNT];
        for bucket in TierBucket::ALL {
            let i = bucket.index();
            buckets[i] = BucketTotals {
                count: self.counts[i].load(Ordering::Relaxed),
                bytes: self.bytes[i].load(Ordering::Relaxed),
            };
        }
        StatsSnapshot { buckets }
    }
}

/// Object count and byte total of one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketTotals {
    pub count: u64,
    pub bytes: u64,
}

impl BucketTotals {
    /// Size in tebibytes
    pub fn tib(&self) -> f64 {
        bytes_to_tib(self.bytes)
    }
}

/// Point-in-time copy of the tier counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    buckets: [BucketTotals; TierBucket::COUNT],
}

impl StatsSnapshot {
    /// Totals of one bucket
    pub fn get(&self, bucket: TierBucket) -> BucketTotals {
        self.buckets[bucket.index()]
    }

    /// Archived objects not rehydrating: archive - to-hot - to-cool
    ///
    /// Derived at report time; never tracked as its own bucket.
    pub fn pending_manual_move(&self) -> BucketTotals {
        let archive = self.get(TierBucket::Archive);
        let to_hot = self.get(TierBucket::ArchiveToHot);
        let to_cool = self.get(TierBucket::ArchiveToCool);

        BucketTotals {
            count: archive
                .count
                .saturating_sub(to_hot.count)
                .saturating_sub(to_cool.count),
            bytes: archive
                .bytes
                .saturating_sub(to_hot.bytes)
                .saturating_sub(to_cool.bytes),
        }
    }
}
