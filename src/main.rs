//! upload-spool - Concurrent content upload spooler
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use upload_spooler::config::{CliArgs, SpoolConfig};
use upload_spooler::progress::{print_header, print_summary, ProgressReporter, UploadProgress};
use upload_spooler::Spooler;

/// Completion notice forwarded from worker threads
struct Completion {
    failed: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every job succeeded
fn run() -> Result<bool> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = SpoolConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &format!(
                "{}:{}",
                config.definition.driver_type, config.definition.spooler_description
            ),
            config.definition.worker_count,
            config.definition.max_pending_jobs,
        );
    }

    let spooler =
        Spooler::new(config.definition.clone()).context("Failed to initialize spooler")?;
    spooler.set_move_mode(config.move_files);

    // Forward completions to this thread for progress display
    let (tx, rx) = crossbeam_channel::unbounded();
    spooler.set_callback(move |result| {
        let _ = tx.send(Completion {
            failed: result.return_code() != 0,
        });
    });

    // Stop submitting on interrupt; already queued work still drains
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing queued uploads...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Submitting files...");
    }

    let start = Instant::now();
    let mut state = UploadProgress::default();

    for file in file_list(&config) {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let file = file.context("Failed to read file list")?;

        if let Ok(meta) = std::fs::metadata(&file) {
            state.bytes += meta.len();
        }

        if config.process {
            spooler.submit_transform(&file, &config.remote_dir, &config.suffix);
        } else {
            spooler.submit_transfer(&file, config.remote_path_for(&file));
        }
        state.submitted += 1;

        drain_completions(&rx, &mut state);
        state.elapsed = start.elapsed();
        if let Some(ref p) = progress {
            p.update(&state);
        }
    }

    spooler.end_of_transaction();

    while state.completed < state.submitted {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(completion) => apply(&completion, &mut state),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        state.elapsed = start.elapsed();
        if let Some(ref p) = progress {
            p.update(&state);
        }
    }

    spooler.wait_for_upload();
    drain_completions(&rx, &mut state);
    state.elapsed = start.elapsed();

    let was_interrupted = interrupted.load(Ordering::SeqCst);
    if let Some(ref p) = progress {
        p.finish(if was_interrupted {
            "Upload interrupted"
        } else {
            "Upload completed"
        });
        print_summary(&state, was_interrupted);
    }

    info!(
        files = state.completed,
        failed = spooler.number_of_failed_jobs(),
        duration_secs = state.elapsed.as_secs(),
        "Upload finished"
    );

    Ok(spooler.number_of_failed_jobs() == 0)
}

/// Files from the command line, or stdin lines when none were given
fn file_list(config: &SpoolConfig) -> Box<dyn Iterator<Item = io::Result<PathBuf>> + '_> {
    if config.files.is_empty() {
        Box::new(
            io::stdin()
                .lock()
                .lines()
                .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
                .map(|line| line.map(|l| PathBuf::from(l.trim()))),
        )
    } else {
        Box::new(config.files.iter().cloned().map(Ok))
    }
}

fn drain_completions(rx: &Receiver<Completion>, state: &mut UploadProgress) {
    while let Ok(completion) = rx.try_recv() {
        apply(&completion, state);
    }
}

fn apply(completion: &Completion, state: &mut UploadProgress) {
    state.completed += 1;
    if completion.failed {
        state.failed += 1;
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("upload_spooler=debug,upload_spool=debug,warn")
    } else {
        EnvFilter::new("upload_spooler=info,upload_spool=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    Ok(())
}
