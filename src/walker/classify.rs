//! Tier classification
//!
//! Maps an object's declared tier and rehydration state to the statistics
//! buckets it counts toward and whether it qualifies for the archive-to-cool
//! transition. Pure and deterministic.

use crate::store::{AccessTier, ObjectRecord, RehydrationStatus};

/// Statistics bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TierBucket {
    /// Every object
    Total = 0,
    /// Objects in the hot tier
    Hot = 1,
    /// Objects in the cool tier
    Cool = 2,
    /// Objects in the archive tier
    Archive = 3,
    /// Archived objects rehydrating toward hot
    ArchiveToHot = 4,
    /// Archived objects rehydrating toward cool
    ArchiveToCool = 5,
}

impl TierBucket {
    /// Number of buckets
    pub const COUNT: usize = 6;

    /// All buckets in reporting order
    pub const ALL: [TierBucket; Self::COUNT] = [
        TierBucket::Total,
        TierBucket::Hot,
        TierBucket::Cool,
        TierBucket::Archive,
        TierBucket::ArchiveToHot,
        TierBucket::ArchiveToCool,
    ];

    /// Position of this bucket in counter arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Label used in status output
    pub fn label(self) -> &'static str {
        match self {
            TierBucket::Total => "Objects",
            TierBucket::Hot => "Hot Objects",
            TierBucket::Cool => "Cool Objects",
            TierBucket::Archive => "Archive Objects",
            TierBucket::ArchiveToHot => "Archive To Hot Objects",
            TierBucket::ArchiveToCool => "Archive To Cool Objects",
        }
    }
}

const UNDECLARED: &[TierBucket] = &[TierBucket::Total];
const HOT: &[TierBucket] = &[TierBucket::Total, TierBucket::Hot];
const COOL: &[TierBucket] = &[TierBucket::Total, TierBucket::Cool];
const ARCHIVE: &[TierBucket] = &[TierBucket::Total, TierBucket::Archive];
const ARCHIVE_TO_HOT: &[TierBucket] = &[
    TierBucket::Total,
    TierBucket::Archive,
    TierBucket::ArchiveToHot,
];
const ARCHIVE_TO_COOL: &[TierBucket] = &[
    TierBucket::Total,
    TierBucket::Archive,
    TierBucket::ArchiveToCool,
];

/// Outcome of classifying one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Buckets to increment, each at most once
    pub buckets: &'static [TierBucket],

    /// Whether the object qualifies for the archive-to-cool transition
    pub eligible: bool,
}

/// Classify an object by declared tier and rehydration state
///
/// Rehydration is only consulted for archived objects.
pub fn classify(
    tier: Option<&AccessTier>,
    rehydration: Option<RehydrationStatus>,
) -> Classification {
    let (buckets, eligible) = match (tier, rehydration) {
        (Some(AccessTier::Hot), _) => (HOT, false),
        (Some(AccessTier::Cool), _) => (COOL, false),
        (Some(AccessTier::Archive), Some(RehydrationStatus::PendingToHot)) => {
            (ARCHIVE_TO_HOT, false)
        }
        (Some(AccessTier::Archive), Some(RehydrationStatus::PendingToCool)) => {
            (ARCHIVE_TO_COOL, false)
        }
        (Some(AccessTier::Archive), None) => (ARCHIVE, true),
        (Some(AccessTier::Other(_)), _) | (None, _) => (UNDECLARED, false),
    };

    Classification { buckets, eligible }
}

/// Classify a listed object record
pub fn classify_record(record: &ObjectRecord) -> Classification {
    classify(record.tier.as_ref(), record.rehydration)
}
