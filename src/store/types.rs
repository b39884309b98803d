//! Object store entry types
//!
//! These types represent what a hierarchical listing returns and what a
//! bulk tier-transition request consumes. They are deliberately small:
//! records are produced by a listing page and discarded after classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage tier declared on an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccessTier {
    /// Online, highest cost per byte stored
    Hot,
    /// Online, cheaper storage with higher access cost
    Cool,
    /// Offline, must be rehydrated before reading
    Archive,
    /// Any other tier name the service reports (premium block tiers, etc.)
    Other(String),
}

impl AccessTier {
    /// Parse a tier name as reported by the service (case-insensitive)
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "hot" => AccessTier::Hot,
            "cool" => AccessTier::Cool,
            "archive" => AccessTier::Archive,
            _ => AccessTier::Other(name.trim().to_string()),
        }
    }

    /// Name as the service spells it
    pub fn as_str(&self) -> &str {
        match self {
            AccessTier::Hot => "Hot",
            AccessTier::Cool => "Cool",
            AccessTier::Archive => "Archive",
            AccessTier::Other(name) => name,
        }
    }
}

impl From<String> for AccessTier {
    fn from(value: String) -> Self {
        AccessTier::parse(&value)
    }
}

impl From<AccessTier> for String {
    fn from(value: AccessTier) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-progress rehydration of an archived object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RehydrationStatus {
    /// Rehydration pending toward the hot tier
    PendingToHot,
    /// Rehydration pending toward the cool tier
    PendingToCool,
}

/// Canonical addressable reference for a single object
///
/// Opaque to the walker; only the store that issued it interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Creates an identifier from the store's canonical reference
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object as reported by a hierarchical listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Full path of the object within the namespace
    pub path: String,

    /// Content length in bytes
    #[serde(default)]
    pub size: u64,

    /// Declared tier (None when the service reports no tier)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<AccessTier>,

    /// Rehydration in progress (only meaningful for archived objects)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rehydration: Option<RehydrationStatus>,
}

impl ObjectRecord {
    /// Create a record with a declared tier and no rehydration
    pub fn new(path: impl Into<String>, size: u64, tier: Option<AccessTier>) -> Self {
        Self {
            path: path.into(),
            size,
            tier,
            rehydration: None,
        }
    }

    /// Create an archived record, optionally rehydrating
    pub fn archived(
        path: impl Into<String>,
        size: u64,
        rehydration: Option<RehydrationStatus>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            tier: Some(AccessTier::Archive),
            rehydration,
        }
    }
}

/// One entry of a hierarchical listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    /// A sub-prefix ("folder"), terminated by the delimiter
    Prefix(String),
    /// An object directly under the listed prefix
    Object(ObjectRecord),
}

impl ListEntry {
    /// Check if this entry is a sub-prefix
    pub fn is_prefix(&self) -> bool {
        matches!(self, ListEntry::Prefix(_))
    }
}

/// One page of a hierarchical listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Entries on this page, in service order
    pub entries: Vec<ListEntry>,

    /// Token to fetch the next page; None when the listing is exhausted
    pub continuation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse() {
        assert_eq!(AccessTier::parse("Hot"), AccessTier::Hot);
        assert_eq!(AccessTier::parse("cool"), AccessTier::Cool);
        assert_eq!(AccessTier::parse(" ARCHIVE "), AccessTier::Archive);
        assert_eq!(AccessTier::parse("P10"), AccessTier::Other("P10".into()));
    }

    #[test]
    fn test_record_json() {
        let line = r#"{"path":"a/b.bin","size":42,"tier":"Archive","rehydration":"pending-to-cool"}"#;
        let record: ObjectRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.tier, Some(AccessTier::Archive));
        assert_eq!(record.rehydration, Some(RehydrationStatus::PendingToCool));

        let bare: ObjectRecord = serde_json::from_str(r#"{"path":"x"}"#).unwrap();
        assert_eq!(bare.size, 0);
        assert_eq!(bare.tier, None);
        assert_eq!(serde_json::to_string(&bare).unwrap(), r#"{"path":"x","size":0}"#);
    }
}
