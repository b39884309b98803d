//! tier-walker - Concurrent Object-Store Tier Scanner
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tier_walker::config::{CliArgs, WalkConfig};
use tier_walker::progress::{
    log_status, print_header, print_summary, report_status, ProgressReporter,
};
use tier_walker::store::{MemoryStore, ObjectStore};
use tier_walker::walker::TierWalkCoordinator;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    info!("Run = {}", config.run_id);
    info!("Prefix = {}", config.prefix);
    info!("Workers = {}", config.worker_count);
    info!("DryRun = {}", config.dry_run);

    let store = Arc::new(
        MemoryStore::load_inventory(&config.inventory_path)
            .context("Failed to load inventory")?
            .with_page_size(config.page_size),
    );
    info!(objects = store.len(), "Inventory loaded");

    if config.show_progress {
        print_header(
            &config.run_id,
            &config.inventory_path.display().to_string(),
            &config.prefix,
            config.worker_count,
            config.dry_run,
        );
    }

    // Setup signal handler for graceful shutdown
    let cancel = CancellationToken::new();
    let ctrl_c_count = Arc::new(AtomicU32::new(0));
    {
        let cancel = cancel.clone();
        let ctrl_c_count = Arc::clone(&ctrl_c_count);
        ctrlc::set_handler(move || {
            let count = ctrl_c_count.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                eprintln!("\nInterrupt received, cancelling...");
                eprintln!("Press Ctrl+C again to force exit immediately.");
                cancel.cancel();
            } else {
                eprintln!("\nForced exit!");
                std::process::exit(130);
            }
        })
        .context("Failed to set signal handler")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    let object_store: Arc<dyn ObjectStore> = store.clone();
    let coordinator = TierWalkCoordinator::new(config.clone(), object_store, cancel);

    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Listing...");
    }

    let start = Instant::now();
    let outcome = runtime.block_on(coordinator.run_with_progress(|status| {
        report_status(progress.as_ref(), status);
    }));

    // Final report goes out on every path
    let final_progress = coordinator.progress(start.elapsed());
    let title = match &outcome {
        Ok(result) if result.completed() => "Walk Complete",
        Ok(_) => "Walk Cancelled",
        Err(_) => "Walk Failed",
    };

    if let Some(ref p) = progress {
        p.finish(title);
    }
    log_status(&final_progress.stats);
    print_summary(title, &final_progress, config.dry_run);

    if !config.dry_run && config.write_back && final_progress.batches > 0 {
        match store.save_inventory(&config.inventory_path) {
            Ok(count) => info!(
                objects = count,
                path = %config.inventory_path.display(),
                "Inventory updated"
            ),
            Err(e) => warn!(error = %e, "Failed to write inventory back"),
        }
    }

    match outcome {
        Ok(result) => {
            if !result.completed() {
                info!("Walk was cancelled before completion");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Unhandled failure");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("tier_walker=debug,warn")
    } else {
        EnvFilter::new("tier_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
