//! Error types for tier-walker
//!
//! This module defines the error hierarchy that covers:
//! - Object store listing and tier-transition errors
//! - Configuration and CLI errors
//! - Inventory file errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors should be actionable - include the prefix or batch involved
//! - Cancellation is a distinguished variant, not a failure

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the tier-walker application
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Object store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (inventory files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run-wide cancellation was observed at a suspension point
    #[error("Operation cancelled")]
    Cancelled,

    /// A traversal unit task terminated abnormally
    #[error("Traversal unit for '{prefix}' terminated: {reason}")]
    UnitAborted { prefix: String, reason: String },
}

impl WalkerError {
    /// Returns true if this error is the cancellation path rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WalkerError::Cancelled)
    }
}

/// Object store errors
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Listing a prefix failed
    #[error("Failed to list prefix '{prefix}': {reason}")]
    ListFailed { prefix: String, reason: String },

    /// The service throttled or timed out a request
    #[error("Request for '{prefix}' timed out or was throttled: {reason}")]
    Throttled { prefix: String, reason: String },

    /// A bulk tier-transition request failed
    #[error("Failed to set tier for batch of {count} objects: {reason}")]
    SetTierFailed { count: usize, reason: String },

    /// A bulk request carried more identifiers than the service accepts
    #[error("Batch of {count} objects exceeds the limit of {max}")]
    BatchTooLarge { count: usize, max: usize },

    /// Object identifier not known to the store
    #[error("Object not found: '{id}'")]
    NotFound { id: String },

    /// Continuation token could not be interpreted
    #[error("Invalid continuation token '{token}'")]
    InvalidContinuation { token: String },

    /// Inventory file could not be parsed
    #[error("Invalid inventory '{path}' at line {line}: {reason}")]
    InvalidInventory {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl StoreError {
    /// Check if this error is a transient service hiccup
    ///
    /// The walker does not retry either class; the distinction is logged.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Throttled { .. })
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid status interval
    #[error("Invalid status interval {secs}s: must be at least 1")]
    InvalidStatusInterval { secs: u64 },

    /// Invalid page size
    #[error("Invalid page size {size}: must be between {min} and {max}")]
    InvalidPageSize { size: usize, min: usize, max: usize },

    /// Inventory path error
    #[error("Invalid inventory path '{path}': {reason}")]
    InvalidInventoryPath { path: PathBuf, reason: String },
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;
