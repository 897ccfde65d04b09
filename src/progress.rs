//! Progress reporting for the upload CLI
//!
//! Provides real-time progress display using indicatif progress bars.

use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct UploadProgress {
    /// Jobs submitted
    pub submitted: u64,

    /// Jobs finished (successfully or not)
    pub completed: u64,

    /// Jobs that failed
    pub failed: u64,

    /// Bytes of submitted source files
    pub bytes: u64,

    /// Elapsed time
    pub elapsed: Duration,
}

impl UploadProgress {
    /// Calculate completed files per second
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }

    /// Jobs submitted but not yet finished
    pub fn in_flight(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}

/// Progress reporter that displays upload status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &UploadProgress) {
        let msg = format!(
            "Done: {} | Queued: {} | Failed: {} | Size: {} | Rate: {:.0}/s",
            format_number(progress.completed),
            format_number(progress.in_flight()),
            format_number(progress.failed),
            format_size(progress.bytes, BINARY),
            progress.files_per_second(),
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
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the upload
pub fn print_summary(progress: &UploadProgress, interrupted: bool) {
    println!();
    if interrupted {
        println!("{}", style("Upload Interrupted").yellow().bold());
    } else {
        println!("{}", style("Upload Complete").green().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Files:").bold(), format_number(progress.completed));
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(progress.bytes, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        progress.elapsed.as_secs_f64(),
        progress.files_per_second()
    );
    if progress.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(progress.failed)
        );
    }
    println!();
}

/// Print a header at the start of the upload
pub fn print_header(definition: &str, workers: usize, capacity: usize) {
    println!();
    println!(
        "{} {}",
        style("upload-spool").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Upstream:").bold(), definition);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Queue:").bold(), capacity);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_upload_progress_rates() {
        let progress = UploadProgress {
            submitted: 1200,
            completed: 1000,
            failed: 3,
            bytes: 1024 * 1024,
            elapsed: Duration::from_secs(10),
        };

        assert!((progress.files_per_second() - 100.0).abs() < 0.1);
        assert_eq!(progress.in_flight(), 200);
        assert_eq!(UploadProgress::default().files_per_second(), 0.0);
    }
}
