//! Progress events and their display.
//!
//! Workers never print. They emit typed [`RenameEvent`]s into a
//! [`ProgressSink`], and whoever owns the sink decides how to show them. The
//! CLI sends them over an `mpsc` channel to a printer thread, which turns each
//! event into one line with [`format_event`].
//!
//! # Output Format
//!
//! ```text
//! Processing 3 images with 10 workers
//! Model: gpt-4.1-nano-2025-04-14
//! Image quality: 80%
//! Output mode: copy into the 'Finish' subfolder
//! #1 chair.png → 红色沙发.png (copied into photos/Finish)
//! #2 table.png failed: HTTP 500: upstream unavailable
//! #3 lamp.jpg → 台灯.jpg (renamed in place in photos)
//!
//! Done: 3 found, 2 renamed, 1 failed
//! ```
//!
//! Format functions are pure: they do no I/O.

use crate::batch::BatchSummary;
use crate::config::OutputMode;
use crate::target::FileOperation;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};

/// Everything a batch run reports while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum RenameEvent {
    /// The source folder is missing or not a directory.
    SourceInvalid { folder: PathBuf },
    /// The source folder holds no supported images.
    NoImagesFound { folder: PathBuf },
    BatchStarted {
        image_count: usize,
        workers: usize,
        model: String,
        quality: u32,
        output_mode: OutputMode,
        custom_folder: Option<PathBuf>,
    },
    Renamed {
        sequence: usize,
        original: String,
        destination: PathBuf,
        operation: FileOperation,
    },
    Failed {
        sequence: usize,
        original: String,
        reason: String,
    },
    /// A stop was requested; jobs not yet started will be skipped.
    Cancelling,
    ReportWritten { path: PathBuf },
    ReportSkipped { reason: String },
}

/// Receives progress events from worker threads.
///
/// Called concurrently from every worker, so implementations must be
/// thread-safe. Emitting must not block for long: it sits on the job's path.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: RenameEvent);
}

/// Events go to the receiving end; a hung-up receiver drops them.
impl ProgressSink for Sender<RenameEvent> {
    fn emit(&self, event: RenameEvent) {
        let _ = self.send(event);
    }
}

/// Discards everything.
impl ProgressSink for () {
    fn emit(&self, _event: RenameEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RenameEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenameEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: RenameEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

// ============================================================================
// Formatting
// ============================================================================

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

/// Format the run banner. One entry per line.
fn banner_lines(
    image_count: usize,
    workers: usize,
    model: &str,
    quality: u32,
    output_mode: OutputMode,
    custom_folder: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![
        format!("Processing {image_count} images with {workers} workers"),
        format!("Model: {model}"),
        format!("Image quality: {quality}%"),
        format!("Output mode: {}", output_mode.describe()),
    ];
    if output_mode == OutputMode::Custom {
        let folder = custom_folder
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string());
        lines.push(format!("Custom output folder: {folder}"));
    }
    lines
}

/// Format one event as display lines.
pub fn format_event(event: &RenameEvent) -> Vec<String> {
    match event {
        RenameEvent::SourceInvalid { folder } => vec![format!(
            "Error: source folder '{}' is missing or not a folder",
            folder.display()
        )],
        RenameEvent::NoImagesFound { folder } => vec![format!(
            "No supported images found in {}",
            folder.display()
        )],
        RenameEvent::BatchStarted {
            image_count,
            workers,
            model,
            quality,
            output_mode,
            custom_folder,
        } => banner_lines(
            *image_count,
            *workers,
            model,
            *quality,
            *output_mode,
            custom_folder.as_deref(),
        ),
        RenameEvent::Renamed {
            sequence,
            original,
            destination,
            operation,
        } => {
            let how = match operation {
                FileOperation::Move => "renamed in place in",
                FileOperation::Copy => "copied into",
            };
            vec![format!(
                "#{sequence} {original} → {} ({how} {})",
                file_name(destination),
                parent_display(destination)
            )]
        }
        RenameEvent::Failed {
            sequence,
            original,
            reason,
        } => vec![format!("#{sequence} {original} failed: {reason}")],
        RenameEvent::Cancelling => {
            vec!["Stop requested, cancelling remaining images...".to_string()]
        }
        RenameEvent::ReportWritten { path } => {
            vec![format!("Report saved to {}", path.display())]
        }
        RenameEvent::ReportSkipped { reason } => vec![format!("Report skipped: {reason}")],
    }
}

/// Format the end-of-run totals.
pub fn format_summary(summary: &BatchSummary) -> Vec<String> {
    let mut line = format!(
        "Done: {} found, {} renamed, {} failed",
        summary.total_found, summary.success, summary.failure
    );
    let skipped = summary.skipped();
    if skipped > 0 {
        line.push_str(&format!(", {skipped} skipped"));
    }
    vec![String::new(), line]
}

/// Print an event to stdout.
pub fn print_event(event: &RenameEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}
