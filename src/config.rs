//! Configuration types for tier-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros (every flag can also
//!   come from a `TIER_WALKER_*` environment variable)
//! - Runtime configuration with validation and defaulting

use crate::error::ConfigError;
use crate::store::memory::DEFAULT_PAGE_SIZE;
use crate::store::DELIMITER;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 4096;

/// Listing page size limits
const MIN_PAGE_SIZE: usize = 1;
const MAX_PAGE_SIZE: usize = 100_000;

/// Default workers per available CPU; listing is I/O bound
const WORKERS_PER_CPU: usize = 8;

/// Object-store tier scanner
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tier-walker",
    version,
    about = "Inventory object-store tiers and move settled archive objects to cool",
    long_about = "Walks an object-store namespace prefix by prefix with bounded parallelism,\n\
                  counts objects per tier and sends bulk archive-to-cool requests for\n\
                  archived objects that are not being rehydrated.\n\n\
                  Use --dry-run to preview the batches without changing any tier.",
    after_help = "EXAMPLES:\n    \
        tier-walker --inventory objects.jsonl --dry-run\n    \
        tier-walker --inventory objects.jsonl --prefix logs/2019 -w 64\n    \
        TIER_WALKER_INVENTORY=objects.jsonl tier-walker -q"
)]
pub struct CliArgs {
    /// JSON-lines object inventory backing the store
    #[arg(long, env = "TIER_WALKER_INVENTORY", value_name = "FILE")]
    pub inventory: PathBuf,

    /// Prefix to start from (default: namespace root)
    #[arg(long, env = "TIER_WALKER_PREFIX", default_value = "", value_name = "PREFIX")]
    pub prefix: String,

    /// Concurrent traversal units (0 = 8x available CPUs)
    #[arg(
        short = 'w',
        long,
        env = "TIER_WALKER_WORKERS",
        default_value_t = 0,
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Classify and count only; send no tier changes
    #[arg(long, visible_alias = "what-if", env = "TIER_WALKER_DRY_RUN")]
    pub dry_run: bool,

    /// Seconds between status reports and completion checks
    #[arg(
        long,
        env = "TIER_WALKER_STATUS_INTERVAL",
        default_value = "1",
        value_name = "SECS"
    )]
    pub status_interval: u64,

    /// Entries per listing page
    #[arg(
        long,
        env = "TIER_WALKER_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE,
        value_name = "NUM"
    )]
    pub page_size: usize,

    /// Do not write updated tiers back to the inventory file
    #[arg(long)]
    pub no_write_back: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (per-prefix debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Default concurrency: a multiple of available parallelism
pub fn default_workers() -> usize {
    num_cpus::get() * WORKERS_PER_CPU
}

/// Normalize a starting prefix
///
/// Empty means the namespace root; anything else ends with the delimiter.
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim();
    if prefix.is_empty() || prefix.ends_with(DELIMITER) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, DELIMITER)
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Identity of this run, attached to every log line
    pub run_id: Uuid,

    /// Starting prefix ("" = root, otherwise delimiter-terminated)
    pub prefix: String,

    /// Concurrency limit for traversal units
    pub worker_count: usize,

    /// Suppress tier changes
    pub dry_run: bool,

    /// Status report and completion poll cadence
    pub status_interval: Duration,

    /// Inventory file backing the store
    pub inventory_path: PathBuf,

    /// Listing page size for the store
    pub page_size: usize,

    /// Persist tier changes to the inventory after the run
    pub write_back: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            prefix: String::new(),
            worker_count: default_workers(),
            dry_run: false,
            status_interval: Duration::from_secs(1),
            inventory_path: PathBuf::new(),
            page_size: DEFAULT_PAGE_SIZE,
            write_back: true,
            show_progress: false,
            verbose: false,
        }
    }
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let worker_count = if args.workers == 0 {
            default_workers()
        } else {
            args.workers
        };

        if worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: worker_count,
                max: MAX_WORKERS,
            });
        }

        if args.status_interval == 0 {
            return Err(ConfigError::InvalidStatusInterval {
                secs: args.status_interval,
            });
        }

        if args.page_size < MIN_PAGE_SIZE || args.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize {
                size: args.page_size,
                min: MIN_PAGE_SIZE,
                max: MAX_PAGE_SIZE,
            });
        }

        if !args.inventory.is_file() {
            return Err(ConfigError::InvalidInventoryPath {
                path: args.inventory.clone(),
                reason: "File does not exist".to_string(),
            });
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            prefix: normalize_prefix(&args.prefix),
            worker_count,
            dry_run: args.dry_run,
            status_interval: Duration::from_secs(args.status_interval),
            inventory_path: args.inventory,
            page_size: args.page_size,
            write_back: !args.no_write_back,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}
