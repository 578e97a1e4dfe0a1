use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapError};
use crate::models::{ExportFormat, ReportKind, SyncType, ALL_KINDS};
use crate::reconciler::ReconcileConfig;
use crate::store::Workspace;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_INPUT_DIR: &str = "./sync-output";
pub const DEFAULT_SNAPSHOT_DIR: &str = "./snapshots";
pub const DEFAULT_OUTPUT_DIR: &str = "./etl-output";

pub const SYNC_TYPE_ENV: &str = "SYNC_TYPE";
pub const INPUT_DIR_ENV: &str = "base_input_dir";
pub const SNAPSHOT_DIR_ENV: &str = "snapshot_dir";
pub const OUTPUT_DIR_ENV: &str = "output_dir";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_periods: Option<u32>,
    #[serde(default)]
    pub sync_type: SyncType,
    #[serde(default = "default_input_dir")]
    pub input_dir: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub export_format: ExportFormat,
    #[serde(default = "default_streams")]
    pub streams: Vec<StreamSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReportKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_periods: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_format: Option<ExportFormat>,
}

impl StreamSettings {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: None,
            report_periods: None,
            export_format: None,
        }
    }

    pub fn kind(&self) -> Result<ReportKind> {
        self.kind
            .or_else(|| ReportKind::for_stream(&self.name))
            .ok_or_else(|| SnapError::UnknownStream(self.name.clone()))
    }
}

fn default_input_dir() -> String {
    DEFAULT_INPUT_DIR.to_string()
}

fn default_snapshot_dir() -> String {
    DEFAULT_SNAPSHOT_DIR.to_string()
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

fn default_streams() -> Vec<StreamSettings> {
    ALL_KINDS
        .iter()
        .map(|k| StreamSettings::named(k.default_stream()))
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report_periods: None,
            sync_type: SyncType::default(),
            input_dir: default_input_dir(),
            snapshot_dir: default_snapshot_dir(),
            output_dir: default_output_dir(),
            export_format: ExportFormat::default(),
            streams: default_streams(),
        }
    }
}

impl Settings {
    /// Environment overrides for the job runner: `SYNC_TYPE` and the three
    /// directory variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(SYNC_TYPE_ENV) {
            self.sync_type = SyncType::parse(&raw).ok_or_else(|| {
                SnapError::Settings(format!("{SYNC_TYPE_ENV}={raw} is not full_sync or incremental_sync"))
            })?;
        }
        if let Some(dir) = lookup(INPUT_DIR_ENV) {
            self.input_dir = dir;
        }
        if let Some(dir) = lookup(SNAPSHOT_DIR_ENV) {
            self.snapshot_dir = dir;
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV) {
            self.output_dir = dir;
        }
        Ok(())
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(
            shellexpand_path(&self.input_dir),
            shellexpand_path(&self.snapshot_dir),
            shellexpand_path(&self.output_dir),
        )
    }

    /// The configured stream, or an ad-hoc entry for an unlisted one.
    pub fn stream(&self, name: &str) -> StreamSettings {
        self.streams
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .unwrap_or_else(|| StreamSettings::named(name))
    }

    pub fn export_format_for(&self, stream: &StreamSettings) -> ExportFormat {
        stream.export_format.unwrap_or(self.export_format)
    }

    pub fn reconcile_config(&self, stream: &StreamSettings, kind: ReportKind, today: NaiveDate) -> ReconcileConfig {
        let periods = stream.report_periods.or(self.report_periods);
        ReconcileConfig {
            sync_type: self.sync_type,
            lookback_periods: kind.lookback_periods(periods),
            today,
        }
    }
}

/// Missing file means defaults; a malformed one is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| SnapError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}
