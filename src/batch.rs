//! Batch coordinator: find the images, fan them out, collect the totals.
//!
//! ```text
//! source folder ──discover──▶ [a.jpg, b.png, …]
//!                                  │ one ImageJob each
//!                                  ▼
//!                    rayon pool (max_workers threads)
//!                                  │ JobOutcome per job, arrival order
//!                                  ▼
//!                  drain ──(cancel seen)──▶ Cancelling event
//!                                  │
//!                                  ▼
//!                  BatchSummary {total_found, success, failure, ledger}
//! ```
//!
//! Jobs are spawned onto a pool built for this run only, so the worker count
//! follows the config rather than whatever global pool the process already
//! has. Every job reports back over an `mpsc` channel; the coordinator reads
//! outcomes until the last sender is gone, which means `run` returns only once
//! every job has either finished or skipped itself. Once cancellation has
//! been seen, jobs that have not started yet skip immediately, so the wait is
//! bounded by whatever is already in flight.

use crate::api::{ApiError, ChatCompletionsClient, NamingClient};
use crate::config::RenameConfig;
use crate::counter::{CancelFlag, SafeCounter};
use crate::imaging::{ImageCodec, RustCodec, supported_input_extensions};
use crate::job::{Counters, ImageJob, JobContext, JobOutcome};
use crate::ledger::{Ledger, LedgerEntry};
use crate::output::{ProgressSink, RenameEvent};
use crate::target::DirectoryLocks;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Client(#[from] ApiError),
}

/// Totals of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_found: usize,
    pub success: usize,
    pub failure: usize,
    /// One row per job that started, in completion order.
    pub ledger: Vec<LedgerEntry>,
}

impl BatchSummary {
    /// The summary of a run that never submitted a job.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Images that were found but never attempted because of a cancel.
    pub fn skipped(&self) -> usize {
        self.total_found
            .saturating_sub(self.success + self.failure)
    }
}

/// State the caller keeps hold of while a run is in progress.
///
/// `cancel` stops the run cooperatively. `active` drops back to zero once no
/// job is executing, and `sequence` counts settled jobs.
#[derive(Debug, Clone, Default)]
pub struct BatchHandles {
    pub cancel: CancelFlag,
    pub active: Arc<SafeCounter>,
    pub sequence: Arc<SafeCounter>,
}

impl BatchHandles {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Supported images directly inside `folder`, sorted by path.
///
/// Not recursive: subfolders (including a previous run's `Finish`) are
/// ignored. Only regular files count, following symlinks; the extension
/// match ignores case.
pub fn discover_images(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let supported = supported_input_extensions();
    let mut images = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| supported.contains(&e.as_str()));
        if matches {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Rename every supported image in `config.source_folder`.
///
/// The config is taken by value and frozen for the whole run. A missing
/// source folder or one without images is reported through `sink` and yields
/// an empty summary; it is not an error.
pub fn run(
    config: RenameConfig,
    codec: Arc<dyn ImageCodec>,
    client: Arc<dyn NamingClient>,
    sink: Arc<dyn ProgressSink>,
    handles: &BatchHandles,
) -> Result<BatchSummary, BatchError> {
    let folder = config.source_folder.clone();
    if !folder.is_dir() {
        tracing::warn!(folder = %folder.display(), "source folder unusable");
        sink.emit(RenameEvent::SourceInvalid { folder });
        return Ok(BatchSummary::empty());
    }

    let images = match discover_images(&folder) {
        Ok(images) => images,
        Err(err) => {
            tracing::warn!(folder = %folder.display(), error = %err, "cannot list source folder");
            sink.emit(RenameEvent::SourceInvalid { folder });
            return Ok(BatchSummary::empty());
        }
    };
    if images.is_empty() {
        sink.emit(RenameEvent::NoImagesFound { folder });
        return Ok(BatchSummary::empty());
    }

    let workers = config.max_workers.max(1);
    sink.emit(RenameEvent::BatchStarted {
        image_count: images.len(),
        workers,
        model: config.model.clone(),
        quality: config.image_quality_percent,
        output_mode: config.output_mode,
        custom_folder: config.custom_folder().map(Path::to_path_buf),
    });
    tracing::info!(images = images.len(), workers, "starting batch");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("picname-worker-{i}"))
        .panic_handler(|_| tracing::error!("worker thread panicked outside a job"))
        .build()?;

    handles.sequence.reset_to(0);
    let counters = Counters {
        success: Arc::new(SafeCounter::new()),
        failure: Arc::new(SafeCounter::new()),
        sequence: Arc::clone(&handles.sequence),
        active: Arc::clone(&handles.active),
    };
    let ledger = Arc::new(Ledger::new());
    let ctx = Arc::new(JobContext {
        config: Arc::new(config),
        codec,
        client,
        sink: Arc::clone(&sink),
        cancel: handles.cancel.clone(),
        counters: counters.clone(),
        ledger: Arc::clone(&ledger),
        dir_locks: DirectoryLocks::new(),
    });

    let total_found = images.len();
    let (tx, rx) = mpsc::channel();
    for path in images {
        let job = ImageJob::new(path, Arc::clone(&ctx));
        let tx = tx.clone();
        pool.spawn(move || {
            let _ = tx.send(job.run());
        });
    }
    drop(tx);

    let mut cancelling = false;
    for outcome in rx {
        if !cancelling && handles.cancel.is_cancelled() {
            cancelling = true;
            tracing::info!("cancellation requested, skipping jobs not yet started");
            sink.emit(RenameEvent::Cancelling);
        }
        if let JobOutcome::Failed { kind } = outcome {
            tracing::debug!(?kind, "job failed");
        }
    }

    Ok(BatchSummary {
        total_found,
        success: counters.success.get(),
        failure: counters.failure.get(),
        ledger: ledger.snapshot(),
    })
}

/// [`run`] with the real codec and the HTTP client built from `config`.
pub fn run_with_defaults(
    config: RenameConfig,
    sink: Arc<dyn ProgressSink>,
    handles: &BatchHandles,
) -> Result<BatchSummary, BatchError> {
    let client = ChatCompletionsClient::from_config(&config)?;
    run(
        config,
        Arc::new(RustCodec::new()),
        Arc::new(client),
        sink,
        handles,
    )
}
