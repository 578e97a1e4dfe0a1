pub mod init;
pub mod run;
pub mod status;
pub mod window;

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use crate::dates::parse_calendar_date;
use crate::error::{Result, SnapError};
use crate::models::{ExportFormat, ReportKind, SyncType};
use crate::settings::{self, Settings, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(
    name = "snapstitch",
    version,
    about = "Stitch incremental accounting report extracts onto persisted snapshots."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Directory holding the sync output (overrides config and $base_input_dir)
    #[arg(long = "input-dir", global = true)]
    pub input_dir: Option<String>,
    /// Directory holding snapshots (overrides config and $snapshot_dir)
    #[arg(long = "snapshot-dir", global = true)]
    pub snapshot_dir: Option<String>,
    /// Directory receiving exports (overrides config and $output_dir)
    #[arg(long = "output-dir", global = true)]
    pub output_dir: Option<String>,
    /// full_sync or incremental_sync (overrides config and $SYNC_TYPE)
    #[arg(long = "sync-type", global = true, value_enum)]
    pub sync_type: Option<SyncType>,
    /// Number of report periods the sync re-supplies
    #[arg(long = "report-periods", global = true)]
    pub report_periods: Option<u32>,
    /// Reconcile as if today were this date: YYYY-MM-DD
    #[arg(long = "as-of", global = true)]
    pub as_of: Option<String>,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Config file, then environment, then flags.
    pub fn load_settings(&self) -> Result<Settings> {
        let mut s = settings::load_settings(&self.config)?;
        s.apply_env(|key| std::env::var(key).ok())?;
        if let Some(dir) = &self.input_dir {
            s.input_dir = dir.clone();
        }
        if let Some(dir) = &self.snapshot_dir {
            s.snapshot_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            s.output_dir = dir.clone();
        }
        if let Some(sync_type) = self.sync_type {
            s.sync_type = sync_type;
        }
        if self.report_periods.is_some() {
            s.report_periods = self.report_periods;
            for stream in &mut s.streams {
                stream.report_periods = None;
            }
        }
        Ok(s)
    }

    /// Today's UTC date unless `--as-of` says otherwise.
    pub fn today(&self) -> Result<NaiveDate> {
        match &self.as_of {
            Some(raw) => parse_calendar_date(raw).ok_or_else(|| SnapError::InvalidDate(raw.clone())),
            None => Ok(Utc::now().date_naive()),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file and create the snapshot and output directories.
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Reconcile one report stream with its snapshot.
    Run {
        /// Stream name, e.g. GeneralLedgerAccrualReport
        stream: String,
        /// Report kind; inferred for the standard stream names
        #[arg(long, value_enum)]
        kind: Option<ReportKind>,
        /// Export format
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
    },
    /// Reconcile every configured stream.
    RunAll,
    /// Show the stored snapshot of every configured stream.
    Status,
    /// Show the stable/volatile cutoff for each report kind.
    Window {
        /// Only this report kind
        #[arg(long, value_enum)]
        kind: Option<ReportKind>,
    },
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}
