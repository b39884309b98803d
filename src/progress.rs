//! Progress and status reporting for the tier walker
//!
//! Provides the periodic/final status report, a live spinner using
//! indicatif, and the header and summary printed around a run.

use crate::walker::{BucketTotals, StatsSnapshot, TierBucket, WalkProgress};
use chrono::Local;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Label of the derived pending-move line
const PENDING_MOVE_LABEL: &str = "Archive To Move Objects";

/// Progress reporter that displays walk status
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &WalkProgress) {
        let total = progress.stats.get(TierBucket::Total);
        let pending = progress.stats.pending_manual_move();

        let msg = format!(
            "Prefixes: {}/{} | Objects: {} | Size: {} | To move: {} | Batches: {} | Workers: {}/{} | Rate: {:.0}/s",
            format_number(progress.units_finished as u64),
            format_number(progress.units_registered as u64),
            format_number(total.count),
            format_size(total.bytes, BINARY),
            format_number(pending.count),
            format_number(progress.batches),
            progress.active_units,
            progress.total_workers,
            progress.prefixes_per_second(),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn status_line(label: &str, totals: BucketTotals) -> String {
    format!(
        "{}: {} in {:.2} TiB",
        label,
        format_number(totals.count),
        totals.tib()
    )
}

/// Status report lines, one per bucket plus the derived pending-move line
pub fn status_lines(stats: &StatsSnapshot) -> Vec<String> {
    let mut lines: Vec<String> = TierBucket::ALL
        .iter()
        .map(|bucket| status_line(bucket.label(), stats.get(*bucket)))
        .collect();
    lines.push(status_line(PENDING_MOVE_LABEL, stats.pending_manual_move()));
    lines
}

/// Emit the status report through the log
pub fn log_status(stats: &StatsSnapshot) {
    for line in status_lines(stats) {
        info!("{}", line);
    }
}

/// Periodic status: log the report and refresh the spinner if one is shown
///
/// The log lines are written with the spinner suspended so the two do not
/// interleave on the terminal. Returns the lines that were logged.
pub fn report_status(reporter: Option<&ProgressReporter>, progress: &WalkProgress) -> Vec<String> {
    let lines = status_lines(&progress.stats);
    let emit = || {
        for line in &lines {
            info!("{}", line);
        }
    };

    match reporter {
        Some(reporter) => {
            reporter.bar.suspend(emit);
            reporter.update(progress);
        }
        None => emit(),
    }

    lines
}

/// Print a header at the start of the walk
pub fn print_header(run_id: &Uuid, inventory: &str, prefix: &str, workers: usize, dry_run: bool) {
    let prefix = if prefix.is_empty() { "(root)" } else { prefix };

    println!();
    println!(
        "{} {}",
        style("tier-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Run:").bold(), run_id);
    println!("  {} {}", style("Inventory:").bold(), inventory);
    println!("  {} {}", style("Prefix:").bold(), prefix);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!(
        "  {} {}",
        style("Started:").bold(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if dry_run {
        println!("  {} {}", style("Mode:").bold(), style("dry run").yellow());
    }
    println!();
}

/// Print the final report of a run
pub fn print_summary(title: &str, progress: &WalkProgress, dry_run: bool) {
    let duration_secs = progress.elapsed.as_secs_f64();

    println!();
    println!("{}", style(title).green().bold());
    println!("{}", style("─".repeat(50)).dim());
    for line in status_lines(&progress.stats) {
        println!("  {}", line);
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} of {}",
        style("Prefixes:").bold(),
        format_number(progress.units_finished as u64),
        format_number(progress.units_registered as u64)
    );
    let batch_label = if dry_run { "Batches (dry run):" } else { "Batches:" };
    println!(
        "  {} {} ({} objects)",
        style(batch_label).bold(),
        format_number(progress.batches),
        format_number(progress.batched_objects)
    );
    println!("  {} {:.1}s", style("Duration:").bold(), duration_secs);
    println!();
}
