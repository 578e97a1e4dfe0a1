use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::balance::{self, BalancePolicy, BalanceResolution};
use crate::models::{union_columns, Record, RecordSet, ReportKind, SyncType, MEMO_COLUMN};
use crate::window::Window;

/// Everything a reconciliation needs to know about the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub sync_type: SyncType,
    pub lookback_periods: u32,
    pub today: NaiveDate,
}

impl ReconcileConfig {
    pub fn window(&self) -> Window {
        Window::new(self.today, self.lookback_periods)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub snapshot_rows: usize,
    pub extract_rows: usize,
    pub stable_kept: usize,
    pub volatile_taken: usize,
    pub stale_dropped: usize,
    pub covered_dropped: usize,
    pub non_dated: usize,
    pub duplicates_dropped: usize,
    pub balances_resolved: usize,
    pub balances_pending: usize,
    pub placeholders_superseded: usize,
    pub output_rows: usize,
}

impl ReconcileStats {
    fn absorb(&mut self, res: &BalanceResolution) {
        self.balances_resolved += res.resolved;
        self.balances_pending += res.pending;
        self.placeholders_superseded += res.superseded;
    }
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// A new snapshot to persist and export.
    Merged { records: RecordSet, stats: ReconcileStats },
    /// No extract data; the existing snapshot stays as it is.
    SnapshotRetained { snapshot: RecordSet },
    NothingToReconcile,
}

pub fn reconcile(
    kind: ReportKind,
    snapshot: Option<RecordSet>,
    extract: Option<RecordSet>,
    config: &ReconcileConfig,
) -> ReconcileOutcome {
    let snapshot = snapshot.filter(|s| !s.is_empty());
    let Some(extract) = extract.filter(|e| !e.is_empty()) else {
        return match snapshot {
            Some(snapshot) if kind.retains_snapshot_without_extract() => {
                info!(rows = snapshot.len(), "no new extract data, keeping snapshot");
                ReconcileOutcome::SnapshotRetained { snapshot }
            }
            _ => {
                info!("no extract data to reconcile");
                ReconcileOutcome::NothingToReconcile
            }
        };
    };

    let (records, stats) = match snapshot {
        Some(snapshot) if config.sync_type == SyncType::IncrementalSync => {
            stitch(kind, snapshot, extract, config)
        }
        Some(snapshot) => {
            info!(replaced = snapshot.len(), "full sync, extract replaces the snapshot");
            write_through(kind, extract, config)
        }
        None => {
            info!("no prior snapshot, extract becomes the snapshot");
            write_through(kind, extract, config)
        }
    };
    ReconcileOutcome::Merged { records, stats }
}

/// The extract alone, with opening balances resolved against itself.
fn write_through(
    kind: ReportKind,
    extract: RecordSet,
    config: &ReconcileConfig,
) -> (RecordSet, ReconcileStats) {
    let mut stats = ReconcileStats {
        extract_rows: extract.len(),
        ..Default::default()
    };
    let RecordSet { columns, records } = extract;

    let records: Vec<Record> = if kind.tracks_beginning_balance() {
        let (placeholders, rest): (Vec<Record>, Vec<Record>) =
            records.into_iter().partition(Record::is_placeholder);
        let (established, rest): (Vec<Record>, Vec<Record>) =
            rest.into_iter().partition(Record::is_opening_balance);
        let res = balance::resolve(
            established,
            placeholders,
            &rest,
            config.lookback_periods,
            BalancePolicy::for_kind(kind),
        );
        stats.absorb(&res);
        res.records.into_iter().chain(rest).collect()
    } else {
        records
    };

    stats.non_dated = records.iter().filter(|r| !r.date.is_valid()).count();
    finish(columns, records, stats)
}

/// Stable snapshot rows, volatile extract rows, and the union of both sides'
/// rows that carry no date.
fn stitch(
    kind: ReportKind,
    snapshot: RecordSet,
    extract: RecordSet,
    config: &ReconcileConfig,
) -> (RecordSet, ReconcileStats) {
    let window = config.window();
    let tracks_balances = kind.tracks_beginning_balance();
    let mut stats = ReconcileStats {
        snapshot_rows: snapshot.len(),
        extract_rows: extract.len(),
        ..Default::default()
    };
    info!(cutoff = %window.cutoff, "clearing snapshot rows dated on or after the cutoff");

    let columns = union_columns(&snapshot.columns, &extract.columns);

    let mut established = Vec::new();
    let mut dated = Vec::new();
    let mut undated = Vec::new();
    for r in snapshot.records {
        if tracks_balances && r.is_opening_balance() {
            established.push(r);
            continue;
        }
        match r.date.valid() {
            Some(d) if window.is_stable(d) => dated.push(r),
            Some(_) => stats.stale_dropped += 1,
            None => undated.push(r),
        }
    }
    stats.stable_kept = dated.len();

    for r in extract.records {
        match r.date.valid() {
            Some(d) if window.is_stable(d) => stats.covered_dropped += 1,
            Some(_) => {
                dated.push(r);
                stats.volatile_taken += 1;
            }
            None => undated.push(r),
        }
    }

    // Placeholders are matched per account by the resolver, not by row key.
    let (placeholders, undated): (Vec<Record>, Vec<Record>) = if tracks_balances {
        undated.into_iter().partition(Record::is_placeholder)
    } else {
        (Vec::new(), undated)
    };
    let undated = dedup_undated(undated, &mut stats);

    let records: Vec<Record> = if tracks_balances {
        let res = balance::resolve(
            established,
            placeholders,
            &dated,
            config.lookback_periods,
            BalancePolicy::for_kind(kind),
        );
        stats.absorb(&res);
        res.records.into_iter().chain(dated).chain(undated).collect()
    } else {
        dated.into_iter().chain(undated).collect()
    };

    stats.non_dated = records.iter().filter(|r| !r.date.is_valid()).count();
    info!(
        stable = stats.stable_kept,
        volatile = stats.volatile_taken,
        stale = stats.stale_dropped,
        "combined incremental extract with snapshot"
    );
    finish(columns, records, stats)
}

/// First occurrence of each (Date, Account#, TransactionTypeId, Categories).
fn dedup_undated(records: Vec<Record>, stats: &mut ReconcileStats) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());
    for r in records {
        if seen.insert(r.identity_key()) {
            out.push(r);
        } else {
            stats.duplicates_dropped += 1;
        }
    }
    out
}

fn finish(
    columns: Vec<String>,
    records: Vec<Record>,
    mut stats: ReconcileStats,
) -> (RecordSet, ReconcileStats) {
    let mut set = RecordSet::new(columns, records);
    if stats.balances_resolved > 0 {
        set.ensure_column(MEMO_COLUMN);
    }
    stats.output_rows = set.len();
    (set, stats)
}
