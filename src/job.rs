//! The per-image pipeline.
//!
//! ```text
//! Pending ──(cancelled)──────────────────────────────▶ Skipped
//!    │
//!    └──▶ Active: compress → ask model → sanitize → place file
//!            ├── ok ──▶ Succeeded   success+1, sequence+1, ledger row, Renamed event
//!            └── err ─▶ Failed      failure+1, sequence+1, ledger row (empty), Failed event
//! ```
//!
//! A job that reaches `Active` always produces exactly one ledger row and one
//! event, whatever goes wrong, and always leaves the `active` counter where it
//! found it. Errors never leave the job: the coordinator only sees a
//! [`JobOutcome`].

use crate::api::{ApiError, NamingClient};
use crate::config::RenameConfig;
use crate::counter::{ActiveGuard, CancelFlag, SafeCounter};
use crate::imaging::{CodecError, ImageCodec, Quality, UPLOAD_MAX_DIMENSIONS};
use crate::ledger::{Ledger, LedgerEntry};
use crate::naming::sanitize_filename;
use crate::output::{ProgressSink, RenameEvent};
use crate::target::{
    DirectoryLocks, FileOperation, TargetError, place_file, resolve_target_dir, unique_path,
};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use thiserror::Error;

/// Extension used when the source has none.
pub const DEFAULT_EXTENSION: &str = "png";

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("Unexpected internal error: {0}")]
    Panicked(String),
}

/// Coarse failure category, one per error family a job can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Decode,
    Encode,
    Api,
    InvalidResponse,
    Config,
    Io,
    Internal,
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Codec(CodecError::NotFound(_)) => FailureKind::NotFound,
            Self::Codec(CodecError::Decode { .. }) => FailureKind::Decode,
            Self::Codec(CodecError::Encode { .. }) => FailureKind::Encode,
            Self::Api(ApiError::InvalidResponse(_)) => FailureKind::InvalidResponse,
            Self::Api(_) => FailureKind::Api,
            Self::Target(TargetError::Config(_)) => FailureKind::Config,
            Self::Target(TargetError::Io { .. }) => FailureKind::Io,
            Self::Panicked(_) => FailureKind::Internal,
        }
    }
}

/// The counters one batch run shares between its jobs.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub success: Arc<SafeCounter>,
    pub failure: Arc<SafeCounter>,
    /// Completion order; labels progress lines.
    pub sequence: Arc<SafeCounter>,
    /// Jobs currently executing.
    pub active: Arc<SafeCounter>,
}

/// Everything a job reads or updates besides its own source path.
///
/// Built once per run and shared behind an `Arc`. The config inside is the
/// run's snapshot and is never mutated.
pub struct JobContext {
    pub config: Arc<RenameConfig>,
    pub codec: Arc<dyn ImageCodec>,
    pub client: Arc<dyn NamingClient>,
    pub sink: Arc<dyn ProgressSink>,
    pub cancel: CancelFlag,
    pub counters: Counters,
    pub ledger: Arc<Ledger>,
    pub dir_locks: DirectoryLocks,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Never started: the run was cancelled first.
    Skipped,
    Succeeded { destination: PathBuf },
    Failed { kind: FailureKind },
}

/// A successful placement.
struct Placement {
    suggestion: String,
    destination: PathBuf,
    operation: FileOperation,
}

/// One image's compress → ask → place pipeline.
pub struct ImageJob {
    source: PathBuf,
    ctx: Arc<JobContext>,
}

impl ImageJob {
    pub fn new(source: PathBuf, ctx: Arc<JobContext>) -> Self {
        Self { source, ctx }
    }

    /// Run the job to completion. Never panics and never returns an error;
    /// every failure is recorded in the counters, ledger and sink.
    pub fn run(&self) -> JobOutcome {
        if self.ctx.cancel.is_cancelled() {
            tracing::debug!(source = %self.source.display(), "skipped, run cancelled");
            return JobOutcome::Skipped;
        }

        let _active = ActiveGuard::enter(&self.ctx.counters.active);
        let original = original_name(&self.source);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.rename()))
            .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(placement) => self.record_success(original, placement),
            Err(err) => self.record_failure(original, err),
        }
    }

    fn rename(&self) -> Result<Placement, JobError> {
        let config = &self.ctx.config;
        let extension = target_extension(&self.source);

        let image = self.ctx.codec.compress(
            &self.source,
            Quality::new(config.image_quality_percent),
            UPLOAD_MAX_DIMENSIONS,
        )?;
        let answer = self.ctx.client.suggest_name(&config.prompt, &image)?;

        let suggestion = sanitize_filename(&answer);
        if suggestion.is_empty() {
            return Err(ApiError::InvalidResponse(format!(
                "no usable file name in model answer {answer:?}"
            ))
            .into());
        }

        let dir = resolve_target_dir(config.output_mode, &self.source, config.custom_folder())?;
        let operation = FileOperation::for_mode(config.output_mode);

        let lock = self.ctx.dir_locks.for_dir(&dir);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let destination = unique_path(&dir.join(format!("{suggestion}.{extension}")));
        place_file(&self.source, &destination, operation)?;

        Ok(Placement {
            suggestion,
            destination,
            operation,
        })
    }

    fn record_success(&self, original: String, placement: Placement) -> JobOutcome {
        let ctx = &self.ctx;
        ctx.ledger
            .append(LedgerEntry::renamed(original.clone(), placement.suggestion));
        ctx.counters.success.increment();
        let sequence = ctx.counters.sequence.increment();

        tracing::info!(
            source = %self.source.display(),
            destination = %placement.destination.display(),
            "renamed"
        );
        ctx.sink.emit(RenameEvent::Renamed {
            sequence,
            original,
            destination: placement.destination.clone(),
            operation: placement.operation,
        });
        JobOutcome::Succeeded {
            destination: placement.destination,
        }
    }

    fn record_failure(&self, original: String, err: JobError) -> JobOutcome {
        let ctx = &self.ctx;
        let kind = err.kind();
        ctx.ledger.append(LedgerEntry::failed(original.clone()));
        ctx.counters.failure.increment();
        let sequence = ctx.counters.sequence.increment();

        tracing::warn!(source = %self.source.display(), ?kind, error = %err, "rename failed");
        ctx.sink.emit(RenameEvent::Failed {
            sequence,
            original,
            reason: err.to_string(),
        });
        JobOutcome::Failed { kind }
    }
}

fn original_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lowercased source extension, or [`DEFAULT_EXTENSION`].
fn target_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}
