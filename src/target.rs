//! Where a renamed file goes, and putting it there.
//!
//! ```text
//! finish_subfolder   photos/chair.png  →  photos/Finish/红色沙发.png   (copy)
//! in_place           photos/chair.png  →  photos/红色沙发.png          (move)
//! custom             photos/chair.png  →  <custom>/红色沙发.png        (copy)
//! ```
//!
//! Existing files are never overwritten: [`unique_path`] appends `_1`, `_2`, …
//! to the stem until it finds a free name. The probe is not atomic with the
//! file operation that follows, so two writers aiming at the same name can
//! still collide. Within one batch run [`DirectoryLocks`] serialises the
//! probe-and-place step per destination directory, which closes that window
//! for the run's own workers; other processes writing to the same folder are
//! not covered.

use crate::config::OutputMode;
use filetime::FileTime;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Name of the subfolder used by [`OutputMode::FinishSubfolder`].
pub const FINISH_DIR_NAME: &str = "Finish";

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TargetError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What happens to the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    /// The source disappears from its old name.
    Move,
    /// The source stays; a copy with the same timestamps is written.
    Copy,
}

impl FileOperation {
    pub fn for_mode(mode: OutputMode) -> Self {
        match mode {
            OutputMode::InPlace => Self::Move,
            OutputMode::FinishSubfolder | OutputMode::Custom => Self::Copy,
        }
    }
}

/// Compute the destination directory for `source` without touching disk.
pub fn target_dir(
    mode: OutputMode,
    source: &Path,
    custom: Option<&Path>,
) -> Result<PathBuf, TargetError> {
    let parent = source.parent().unwrap_or(Path::new("."));
    match mode {
        OutputMode::FinishSubfolder => Ok(parent.join(FINISH_DIR_NAME)),
        OutputMode::InPlace => Ok(parent.to_path_buf()),
        OutputMode::Custom => custom
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                TargetError::Config("output_mode is \"custom\" but custom_output_folder is not set".into())
            }),
    }
}

/// Compute the destination directory and create it if needed.
pub fn resolve_target_dir(
    mode: OutputMode,
    source: &Path,
    custom: Option<&Path>,
) -> Result<PathBuf, TargetError> {
    let dir = target_dir(mode, source, custom)?;
    fs::create_dir_all(&dir).map_err(|e| TargetError::io("Failed to create folder", &dir, e))?;
    Ok(dir)
}

/// Return `candidate` if nothing exists there, otherwise the first free
/// `stem_N.ext` for N = 1, 2, …
///
/// ```text
/// photo.jpg (exists) → photo_1.jpg
/// photo.jpg, photo_1.jpg (exist) → photo_2.jpg
/// ```
pub fn unique_path(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u64;
    loop {
        let path = candidate.with_file_name(format!("{stem}_{n}{extension}"));
        if !path.exists() {
            return path;
        }
        n += 1;
    }
}

/// Move or copy `source` to `dest`.
///
/// Moves fall back to copy-then-delete when `dest` is on another filesystem.
/// Copies carry over permissions and access/modification times.
pub fn place_file(source: &Path, dest: &Path, operation: FileOperation) -> Result<(), TargetError> {
    match operation {
        FileOperation::Copy => copy_with_times(source, dest),
        FileOperation::Move => match fs::rename(source, dest) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                copy_with_times(source, dest)?;
                fs::remove_file(source)
                    .map_err(|e| TargetError::io("Failed to remove original", source, e))
            }
            Err(e) => Err(TargetError::io("Failed to move file to", dest, e)),
        },
    }
}

fn copy_with_times(source: &Path, dest: &Path) -> Result<(), TargetError> {
    fs::copy(source, dest).map_err(|e| TargetError::io("Failed to copy file to", dest, e))?;
    let metadata =
        fs::metadata(source).map_err(|e| TargetError::io("Failed to read metadata of", source, e))?;
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
    .map_err(|e| TargetError::io("Failed to set file times on", dest, e))
}

/// One lock per destination directory, shared by every job in a run.
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `dir`. Hold its guard across [`unique_path`] and
    /// [`place_file`].
    pub fn for_dir(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(dir.to_path_buf()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finish_subfolder_sits_next_to_source() {
        let dir = target_dir(
            OutputMode::FinishSubfolder,
            Path::new("/photos/chair.png"),
            None,
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/photos/Finish"));
    }

    #[test]
    fn in_place_is_source_directory() {
        let dir = target_dir(OutputMode::InPlace, Path::new("/photos/chair.png"), None).unwrap();
        assert_eq!(dir, PathBuf::from("/photos"));
    }

    #[test]
    fn custom_uses_configured_folder() {
        let dir = target_dir(
            OutputMode::Custom,
            Path::new("/photos/chair.png"),
            Some(Path::new("/out")),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/out"));
    }

    #[test]
    fn custom_without_folder_is_config_error() {
        for custom in [None, Some(Path::new(""))] {
            let result = target_dir(OutputMode::Custom, Path::new("/photos/chair.png"), custom);
            assert!(matches!(result, Err(TargetError::Config(_))));
        }
    }

    #[test]
    fn resolve_creates_directory_idempotently() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("chair.png");

        let first = resolve_target_dir(OutputMode::FinishSubfolder, &source, None).unwrap();
        assert!(first.is_dir());
        let second = resolve_target_dir(OutputMode::FinishSubfolder, &source, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn resolve_reports_unusable_directory() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "a file, not a folder").unwrap();

        let result = resolve_target_dir(
            OutputMode::Custom,
            &tmp.path().join("chair.png"),
            Some(&blocker.join("out")),
        );
        assert!(matches!(result, Err(TargetError::Io { .. })));
    }

    #[test]
    fn unique_path_returns_free_candidate() {
        let tmp = TempDir::new().unwrap();
        let candidate = tmp.path().join("photo.jpg");
        assert_eq!(unique_path(&candidate), candidate);
    }

    #[test]
    fn unique_path_appends_counter() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("photo.jpg"), "").unwrap();
        assert_eq!(
            unique_path(&tmp.path().join("photo.jpg")),
            tmp.path().join("photo_1.jpg")
        );

        fs::write(tmp.path().join("photo_1.jpg"), "").unwrap();
        assert_eq!(
            unique_path(&tmp.path().join("photo.jpg")),
            tmp.path().join("photo_2.jpg")
        );
    }

    #[test]
    fn unique_path_without_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("README"), "").unwrap();
        assert_eq!(
            unique_path(&tmp.path().join("README")),
            tmp.path().join("README_1")
        );
    }

    #[test]
    fn copy_keeps_original_and_mtime() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("chair.png");
        fs::write(&source, b"pixels").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, old).unwrap();

        let dest = tmp.path().join("sofa.png");
        place_file(&source, &dest, FileOperation::Copy).unwrap();

        assert!(source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
        let copied = FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
        assert_eq!(copied, old);
    }

    #[test]
    fn move_removes_original() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("chair.png");
        fs::write(&source, b"pixels").unwrap();

        let dest = tmp.path().join("sofa.png");
        place_file(&source, &dest, FileOperation::Move).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
    }

    #[test]
    fn missing_source_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = place_file(
            &tmp.path().join("gone.png"),
            &tmp.path().join("sofa.png"),
            FileOperation::Copy,
        );
        assert!(matches!(result, Err(TargetError::Io { .. })));
    }

    #[test]
    fn operation_follows_output_mode() {
        assert_eq!(FileOperation::for_mode(OutputMode::InPlace), FileOperation::Move);
        assert_eq!(FileOperation::for_mode(OutputMode::FinishSubfolder), FileOperation::Copy);
        assert_eq!(FileOperation::for_mode(OutputMode::Custom), FileOperation::Copy);
    }

    #[test]
    fn directory_locks_are_shared_per_directory() {
        let locks = DirectoryLocks::new();
        let a = locks.for_dir(Path::new("/out"));
        let b = locks.for_dir(Path::new("/out"));
        let c = locks.for_dir(Path::new("/elsewhere"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
