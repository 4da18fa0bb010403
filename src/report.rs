//! Renaming report: the ledger as a two-column table.
//!
//! The report lands next to the renamed files:
//!
//! | Output mode | Report folder |
//! |-------------|---------------|
//! | `finish_subfolder` | `<source>/Finish` |
//! | `in_place` | `<source>` |
//! | `custom` | the custom folder, or `<source>` when none is set |
//!
//! If that folder cannot be created the source folder is used instead. An
//! existing report is never overwritten; the new one gets a `_N` suffix.
//!
//! The file is CSV with a UTF-8 byte order mark, so spreadsheet tools that
//! guess the encoding still show non-ASCII names correctly.

use crate::batch::BatchSummary;
use crate::config::{OutputMode, RenameConfig};
use crate::ledger::LedgerEntry;
use crate::output::{ProgressSink, RenameEvent};
use crate::target::{FINISH_DIR_NAME, unique_path};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REPORT_HEADER: [&str; 2] = ["Original Filename", "New Filename"];

const UTF8_BOM: &str = "\u{feff}";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Persists a ledger.
pub trait ReportSink {
    /// Write `ledger` into `dir` under `filename` (or a free variant of it).
    ///
    /// Returns the path written, or `None` when there was nothing to write.
    fn write(
        &self,
        ledger: &[LedgerEntry],
        dir: &Path,
        filename: &str,
    ) -> Result<Option<PathBuf>, ReportError>;
}

/// CSV writer for the renaming report.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReport;

impl ReportSink for CsvReport {
    fn write(
        &self,
        ledger: &[LedgerEntry],
        dir: &Path,
        filename: &str,
    ) -> Result<Option<PathBuf>, ReportError> {
        if ledger.is_empty() {
            return Ok(None);
        }
        let path = unique_path(&dir.join(filename));
        write_csv(&path, ledger).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }
}

fn write_csv(path: &Path, ledger: &[LedgerEntry]) -> io::Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    out.write_all(UTF8_BOM.as_bytes())?;
    write_row(&mut out, &REPORT_HEADER)?;
    for entry in ledger {
        write_row(
            &mut out,
            &[
                entry.original_name.as_str(),
                entry.new_name_suggestion.as_str(),
            ],
        )?;
    }
    out.flush()
}

fn write_row(out: &mut impl Write, fields: &[&str]) -> io::Result<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    write!(out, "{line}\r\n")
}

/// Quote a field when it holds a delimiter, a quote or a line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Preferred report folder for `config`, before any fallback.
pub fn preferred_report_dir(config: &RenameConfig) -> PathBuf {
    let source = &config.source_folder;
    match config.output_mode {
        OutputMode::FinishSubfolder => source.join(FINISH_DIR_NAME),
        OutputMode::InPlace => source.clone(),
        OutputMode::Custom => config
            .custom_folder()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| source.clone()),
    }
}

/// The report folder for `config`, created if needed.
///
/// Falls back to the source folder when the preferred one cannot be created.
pub fn report_dir(config: &RenameConfig) -> PathBuf {
    let preferred = preferred_report_dir(config);
    match fs::create_dir_all(&preferred) {
        Ok(()) => preferred,
        Err(err) => {
            tracing::warn!(
                folder = %preferred.display(),
                error = %err,
                "cannot create report folder, using source folder"
            );
            config.source_folder.clone()
        }
    }
}

/// Write the report for a finished run, honouring `config.report`.
///
/// Outcomes other than a hard write failure are reported through `sink`.
pub fn write_report(
    config: &RenameConfig,
    summary: &BatchSummary,
    report: &dyn ReportSink,
    sink: &dyn ProgressSink,
) -> Result<Option<PathBuf>, ReportError> {
    if !config.report.enabled {
        return Ok(None);
    }
    if summary.success == 0 {
        sink.emit(RenameEvent::ReportSkipped {
            reason: "no images were renamed".into(),
        });
        return Ok(None);
    }

    let dir = report_dir(config);
    match report.write(&summary.ledger, &dir, &config.report.filename)? {
        Some(path) => {
            tracing::info!(path = %path.display(), rows = summary.ledger.len(), "report written");
            sink.emit(RenameEvent::ReportWritten { path: path.clone() });
            Ok(Some(path))
        }
        None => {
            sink.emit(RenameEvent::ReportSkipped {
                reason: "the ledger is empty".into(),
            });
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingSink;
    use tempfile::TempDir;

    fn ledger() -> Vec<LedgerEntry> {
        vec![
            LedgerEntry::renamed("chair.png", "红色沙发"),
            LedgerEntry::failed("table.png"),
        ]
    }

    fn summary_of(ledger: Vec<LedgerEntry>) -> BatchSummary {
        let success = ledger.iter().filter(|e| e.is_renamed()).count();
        BatchSummary {
            total_found: ledger.len(),
            success,
            failure: ledger.len() - success,
            ledger,
        }
    }

    fn config_for(tmp: &TempDir, mode: OutputMode) -> RenameConfig {
        RenameConfig {
            source_folder: tmp.path().to_path_buf(),
            output_mode: mode,
            ..Default::default()
        }
    }

    #[test]
    fn csv_has_bom_header_and_rows() {
        let tmp = TempDir::new().unwrap();
        let path = CsvReport
            .write(&ledger(), tmp.path(), "renames.csv")
            .unwrap()
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "\u{feff}Original Filename,New Filename\r\nchair.png,红色沙发\r\ntable.png,\r\n"
        );
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn existing_report_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("renames.csv"), "old").unwrap();

        let path = CsvReport
            .write(&ledger(), tmp.path(), "renames.csv")
            .unwrap()
            .unwrap();

        assert_eq!(path, tmp.path().join("renames_1.csv"));
        assert_eq!(fs::read_to_string(tmp.path().join("renames.csv")).unwrap(), "old");
    }

    #[test]
    fn empty_ledger_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let written = CsvReport.write(&[], tmp.path(), "renames.csv").unwrap();
        assert_eq!(written, None);
        assert!(!tmp.path().join("renames.csv").exists());
    }

    #[test]
    fn report_folder_follows_output_mode() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            preferred_report_dir(&config_for(&tmp, OutputMode::FinishSubfolder)),
            tmp.path().join("Finish")
        );
        assert_eq!(
            preferred_report_dir(&config_for(&tmp, OutputMode::InPlace)),
            tmp.path()
        );
        assert_eq!(
            preferred_report_dir(&config_for(&tmp, OutputMode::Custom)),
            tmp.path()
        );

        let custom = RenameConfig {
            custom_output_folder: tmp.path().join("out"),
            ..config_for(&tmp, OutputMode::Custom)
        };
        assert_eq!(preferred_report_dir(&custom), tmp.path().join("out"));
    }

    #[test]
    fn report_folder_falls_back_to_source() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let config = RenameConfig {
            custom_output_folder: blocker.join("out"),
            ..config_for(&tmp, OutputMode::Custom)
        };
        assert_eq!(report_dir(&config), tmp.path());
    }

    #[test]
    fn write_report_emits_written_event() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordingSink::new();
        let config = config_for(&tmp, OutputMode::FinishSubfolder);

        let path = write_report(&config, &summary_of(ledger()), &CsvReport, &sink)
            .unwrap()
            .unwrap();

        assert_eq!(path, tmp.path().join("Finish").join("renames.csv"));
        assert_eq!(sink.events(), vec![RenameEvent::ReportWritten { path }]);
    }

    #[test]
    fn write_report_skips_when_nothing_renamed() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordingSink::new();
        let config = config_for(&tmp, OutputMode::InPlace);

        let written = write_report(
            &config,
            &summary_of(vec![LedgerEntry::failed("a.png")]),
            &CsvReport,
            &sink,
        )
        .unwrap();

        assert_eq!(written, None);
        assert!(matches!(
            sink.events().as_slice(),
            [RenameEvent::ReportSkipped { .. }]
        ));
    }

    #[test]
    fn disabled_report_is_silent() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordingSink::new();
        let mut config = config_for(&tmp, OutputMode::InPlace);
        config.report.enabled = false;

        let written = write_report(&config, &summary_of(ledger()), &CsvReport, &sink).unwrap();

        assert_eq!(written, None);
        assert!(sink.events().is_empty());
    }
}
