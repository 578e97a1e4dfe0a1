use std::path::PathBuf;

use chrono::NaiveDate;
use colored::Colorize;
use tracing::{error, info_span};

use crate::cli::GlobalArgs;
use crate::error::{Result, SnapError};
use crate::models::{ExportFormat, ReportKind};
use crate::reconciler::{self, ReconcileOutcome, ReconcileStats};
use crate::settings::{Settings, StreamSettings};

#[derive(Debug)]
pub enum StreamResult {
    Merged {
        stats: ReconcileStats,
        snapshot_path: PathBuf,
        export_path: PathBuf,
    },
    Retained {
        rows: usize,
        export_path: PathBuf,
    },
    Skipped,
}

/// Load, reconcile, persist and export one stream.
///
/// The snapshot is written before the export, and nothing is written when
/// the reconciler has no new data.
pub fn reconcile_stream(
    settings: &Settings,
    stream: &StreamSettings,
    kind: ReportKind,
    format: ExportFormat,
    today: NaiveDate,
) -> Result<StreamResult> {
    let _span = info_span!("stream", name = %stream.name, %kind).entered();
    let ws = settings.workspace();
    ws.ensure_dirs()?;
    let config = settings.reconcile_config(stream, kind, today);

    let snapshot = ws.read_snapshot(&stream.name);
    let extract = ws.read_extract(&stream.name)?;

    match reconciler::reconcile(kind, snapshot, extract, &config) {
        ReconcileOutcome::Merged { records, stats } => {
            let snapshot_path = ws.write_snapshot(&stream.name, &records, true)?;
            let export_path = ws.write_export(&records, &stream.name, format)?;
            Ok(StreamResult::Merged {
                stats,
                snapshot_path,
                export_path,
            })
        }
        ReconcileOutcome::SnapshotRetained { snapshot } => {
            let export_path = ws.write_export(&snapshot, &stream.name, format)?;
            Ok(StreamResult::Retained {
                rows: snapshot.len(),
                export_path,
            })
        }
        ReconcileOutcome::NothingToReconcile => Ok(StreamResult::Skipped),
    }
}

pub fn run(global: &GlobalArgs, stream: &str, kind: Option<ReportKind>, format: Option<ExportFormat>) -> Result<()> {
    let settings = global.load_settings()?;
    let today = global.today()?;
    let mut stream = settings.stream(stream);
    if kind.is_some() {
        stream.kind = kind;
    }
    let kind = stream.kind()?;
    let format = format.unwrap_or_else(|| settings.export_format_for(&stream));

    let result = reconcile_stream(&settings, &stream, kind, format, today)?;
    print_result(&stream.name, kind, &result);
    Ok(())
}

pub fn run_all(global: &GlobalArgs) -> Result<()> {
    let settings = global.load_settings()?;
    let today = global.today()?;

    let mut failed = 0usize;
    for stream in &settings.streams {
        let outcome = stream.kind().and_then(|kind| {
            let format = settings.export_format_for(stream);
            reconcile_stream(&settings, stream, kind, format, today).map(|r| (kind, r))
        });
        match outcome {
            Ok((kind, result)) => print_result(&stream.name, kind, &result),
            Err(e) => {
                error!(stream = %stream.name, error = %e, "stream failed, snapshot left untouched");
                eprintln!("{} {}: {e}", "FAILED".red().bold(), stream.name);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(SnapError::StreamsFailed(failed));
    }
    Ok(())
}

fn print_result(stream: &str, kind: ReportKind, result: &StreamResult) {
    let label = format!("{stream} ({kind})");
    match result {
        StreamResult::Merged {
            stats,
            snapshot_path,
            export_path,
        } => {
            println!("{} {}: {} rows", "MERGED".green().bold(), label.bold(), stats.output_rows);
            println!(
                "  snapshot {} / extract {} | stable kept {} | volatile taken {} | stale dropped {} | duplicates {}",
                stats.snapshot_rows,
                stats.extract_rows,
                stats.stable_kept,
                stats.volatile_taken,
                stats.stale_dropped,
                stats.duplicates_dropped,
            );
            if stats.balances_resolved + stats.balances_pending + stats.placeholders_superseded > 0 {
                println!(
                    "  opening balances: {} resolved, {} pending, {} superseded",
                    stats.balances_resolved, stats.balances_pending, stats.placeholders_superseded
                );
            }
            println!("  Snapshot: {}", snapshot_path.display());
            println!("  Export:   {}", export_path.display());
        }
        StreamResult::Retained { rows, export_path } => {
            println!("{} {}: no new data, snapshot kept ({rows} rows)", "KEPT".yellow().bold(), label.bold());
            println!("  Export:   {}", export_path.display());
        }
        StreamResult::Skipped => {
            println!("{} {}: nothing to reconcile", "SKIPPED".dimmed(), label.bold());
        }
    }
}
