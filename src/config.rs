//! Rename configuration.
//!
//! Handles loading, validating, and layering `picname.toml`. Values are
//! resolved in three layers, each overriding the one before:
//!
//! ```text
//! stock defaults  →  picname.toml  →  command-line flags
//! ```
//!
//! The result is a [`RenameConfig`]: the snapshot a batch run takes by value
//! and shares read-only with every job. Nothing mutates it once a run starts.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! base_url = "https://api.openai.com"   # /v1/chat/completions is appended
//! api_key = ""                          # or PICNAME_API_KEY
//! model = "gpt-4.1-nano-2025-04-14"
//! prompt = "..."                        # instruction sent with every image
//! image_quality_percent = 80            # JPEG quality of the upload (1-95)
//! max_workers = 10                      # parallel requests (1-100)
//! source_folder = ""                    # folder whose images get renamed
//! output_mode = "finish_subfolder"      # finish_subfolder | in_place | custom
//! custom_output_folder = ""             # required when output_mode = "custom"
//!
//! [report]
//! enabled = true                        # write a CSV of old → new names
//! filename = "renames.csv"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "picname.toml";

/// Where renamed files land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Copy into `<source>/Finish/`, leaving originals untouched.
    #[default]
    FinishSubfolder,
    /// Rename the originals where they are.
    InPlace,
    /// Copy into `custom_output_folder`.
    Custom,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FinishSubfolder => "finish_subfolder",
            Self::InPlace => "in_place",
            Self::Custom => "custom",
        }
    }

    /// Short human description, used in the run banner.
    pub fn describe(self) -> &'static str {
        match self {
            Self::FinishSubfolder => "copy into the 'Finish' subfolder",
            Self::InPlace => "rename in place",
            Self::Custom => "copy into a custom folder",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full configuration for a rename run.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenameConfig {
    /// API root; `/v1/chat/completions` is appended.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Instruction sent alongside every image.
    pub prompt: String,
    /// JPEG quality for the upload payload, 1-95.
    pub image_quality_percent: u32,
    /// Worker threads, and therefore concurrent requests.
    pub max_workers: usize,
    pub source_folder: PathBuf,
    pub output_mode: OutputMode,
    /// Only read when `output_mode = "custom"`. Empty means unset.
    pub custom_output_folder: PathBuf,
    pub report: ReportConfig,
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano-2025-04-14";
pub const DEFAULT_PROMPT: &str = "请识别图片内容并用中文命名，要求：1.简洁(不超过10个字)。2.准确。3.不包含任何标点及特殊符号。";

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            image_quality_percent: 80,
            max_workers: 10,
            source_folder: PathBuf::new(),
            output_mode: OutputMode::default(),
            custom_output_folder: PathBuf::new(),
            report: ReportConfig::default(),
        }
    }
}

impl RenameConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// A `custom` output mode without a folder is *not* rejected here: every
    /// job reports it as its own failure, so the ledger still lists each file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=95).contains(&self.image_quality_percent) {
            return Err(ConfigError::Validation(
                "image_quality_percent must be 1-95".into(),
            ));
        }
        if !(1..=100).contains(&self.max_workers) {
            return Err(ConfigError::Validation("max_workers must be 1-100".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Validation("model must not be empty".into()));
        }
        Ok(())
    }

    /// The configured custom folder, or `None` when unset.
    pub fn custom_folder(&self) -> Option<&Path> {
        let folder = self.custom_output_folder.as_path();
        (!folder.as_os_str().is_empty()).then_some(folder)
    }

    /// Full chat-completion URL derived from `base_url`.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim();
        let base = if base.is_empty() { DEFAULT_BASE_URL } else { base };
        format!("{}/v1/chat/completions", base.trim_end_matches('/'))
    }
}

/// Report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub enabled: bool,
    pub filename: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filename: "renames.csv".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(RenameConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Layer `overlays` (in order) over the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<RenameConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .fold(stock_defaults_value(), merge_toml);
    let config: RenameConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, layering `cli_overrides` on top.
///
/// A missing file is not an error: the stock defaults apply.
pub fn load_config(path: &Path, cli_overrides: toml::Table) -> Result<RenameConfig, ConfigError> {
    let file = load_raw_config(path)?;
    let overlays = file
        .into_iter()
        .chain(std::iter::once(toml::Value::Table(cli_overrides)));
    resolve_config(overlays)
}

/// Returns a fully-commented stock `picname.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# picname configuration
# ======================
# All keys are optional. Values shown are the defaults.
# Command-line flags override anything set here.

# API root of an OpenAI-compatible service. "/v1/chat/completions" is appended.
base_url = "https://api.openai.com"

# Bearer token. Leave empty and export PICNAME_API_KEY instead to keep it out
# of the file.
api_key = ""

# Any vision-capable chat model the service offers.
model = "gpt-4.1-nano-2025-04-14"

# Instruction sent with every image. The reply becomes the new file name.
prompt = "请识别图片内容并用中文命名，要求：1.简洁(不超过10个字)。2.准确。3.不包含任何标点及特殊符号。"

# JPEG quality of the uploaded preview (1-95). Lower is faster and cheaper.
image_quality_percent = 80

# Images processed at the same time (1-100).
max_workers = 10

# Folder whose images get renamed. Sub-folders are not scanned.
source_folder = ""

# Where renamed files go:
#   "finish_subfolder"  copy into <source_folder>/Finish/
#   "in_place"          rename the originals
#   "custom"            copy into custom_output_folder
output_mode = "finish_subfolder"

# Target folder for output_mode = "custom".
custom_output_folder = ""

[report]
# Write a CSV listing every original name and its suggested name.
enabled = true
filename = "renames.csv"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = RenameConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com");
        assert_eq!(config.model, "gpt-4.1-nano-2025-04-14");
        assert_eq!(config.image_quality_percent, 80);
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.output_mode, OutputMode::FinishSubfolder);
        assert!(config.report.enabled);
        assert_eq!(config.report.filename, "renames.csv");
        config.validate().unwrap();
    }

    #[test]
    fn stock_config_toml_matches_defaults() {
        let parsed: RenameConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, RenameConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
            model = "gpt-4o-mini"
            output_mode = "in_place"

            [report]
            enabled = false
        "#;
        let config: RenameConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.output_mode, OutputMode::InPlace);
        assert!(!config.report.enabled);
        assert_eq!(config.report.filename, "renames.csv");
        assert_eq!(config.max_workers, 10);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<RenameConfig, _> = toml::from_str("max_wokers = 3");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_output_mode_rejected() {
        let result: Result<RenameConfig, _> = toml::from_str(r#"output_mode = "elsewhere""#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_quality_range() {
        for bad in [0, 96, 100] {
            let config = RenameConfig {
                image_quality_percent: bad,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        }
        for good in [1, 95] {
            let config = RenameConfig {
                image_quality_percent: good,
                ..Default::default()
            };
            config.validate().unwrap();
        }
    }

    #[test]
    fn validate_worker_range() {
        let config = RenameConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = RenameConfig {
            max_workers: 101,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_allows_custom_mode_without_folder() {
        let config = RenameConfig {
            output_mode: OutputMode::Custom,
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.custom_folder(), None);
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let config = RenameConfig {
            base_url: " https://llm.example.com/ ".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://llm.example.com/v1/chat/completions");
    }

    #[test]
    fn endpoint_falls_back_to_default() {
        let config = RenameConfig {
            base_url: "  ".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn merge_toml_nested_override() {
        let base: toml::Value = toml::from_str(
            r#"
            model = "a"
            [report]
            enabled = true
            filename = "x.csv"
            "#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
            [report]
            filename = "y.csv"
            "#,
        )
        .unwrap();

        let merged = merge_toml(base, overlay);
        assert_eq!(merged["model"].as_str(), Some("a"));
        assert_eq!(merged["report"]["enabled"].as_bool(), Some(true));
        assert_eq!(merged["report"]["filename"].as_str(), Some("y.csv"));
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME), toml::Table::new()).unwrap();
        assert_eq!(config, RenameConfig::default());
    }

    #[test]
    fn cli_overrides_beat_file_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_workers = 4\nmodel = \"from-file\"\n").unwrap();

        let mut overrides = toml::Table::new();
        overrides.insert("max_workers".into(), toml::Value::Integer(2));

        let config = load_config(&path, overrides).unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.model, "from-file");
    }

    #[test]
    fn load_config_validates_result() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "image_quality_percent = 99\n").unwrap();

        let result = load_config(&path, toml::Table::new());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_reports_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_workers = [").unwrap();

        let result = load_config(&path, toml::Table::new());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
