use std::collections::{BTreeMap, HashMap};

use chrono::{Months, NaiveDate};
use tracing::{debug, info};

use crate::dates::{RowDate, BEGINNING_BALANCE};
use crate::models::{Record, ReportKind, MEMO_COLUMN};
use crate::window::first_day_of_month;

/// Which opening balance survives when an account has more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancePolicy {
    /// The first one already recorded in the snapshot.
    KeepFirst,
    /// The one with the oldest date; ties go to the first recorded.
    KeepEarliest,
}

impl BalancePolicy {
    pub fn for_kind(kind: ReportKind) -> Self {
        match kind {
            ReportKind::GeneralLedgerCash => Self::KeepEarliest,
            ReportKind::GeneralLedger | ReportKind::ProfitAndLoss => Self::KeepFirst,
        }
    }
}

#[derive(Debug, Default)]
pub struct BalanceResolution {
    /// One opening-balance row per account, resolved or still pending.
    pub records: Vec<Record>,
    pub resolved: usize,
    pub pending: usize,
    pub superseded: usize,
}

/// Opening-balance date for an account whose first transaction is `min_date`:
/// the last day of the month before `min_date - (lookback + 1)` months.
pub fn opening_balance_date(min_date: NaiveDate, lookback_periods: u32) -> Option<NaiveDate> {
    let anchor = min_date.checked_sub_months(Months::new(lookback_periods + 1))?;
    first_day_of_month(anchor).pred_opt()
}

/// Earliest transaction date per account, ignoring opening-balance rows.
pub fn earliest_dates(history: &[Record]) -> HashMap<String, NaiveDate> {
    let mut min_dates: HashMap<String, NaiveDate> = HashMap::new();
    for r in history {
        if r.is_placeholder() || r.is_opening_balance() {
            continue;
        }
        let (Some(account), Some(date)) = (r.account(), r.date.valid()) else {
            continue;
        };
        min_dates
            .entry(account.to_string())
            .and_modify(|d| *d = (*d).min(date))
            .or_insert(date);
    }
    min_dates
}

/// Settle opening balances for one reconciliation.
///
/// `established` are opening balances already resolved in the snapshot; they
/// are never replaced by a recomputed value. `placeholders` are rows still
/// dated "Beginning Balance". `history` supplies each account's transactions.
pub fn resolve(
    established: Vec<Record>,
    placeholders: Vec<Record>,
    history: &[Record],
    lookback_periods: u32,
    policy: BalancePolicy,
) -> BalanceResolution {
    let mut out = BalanceResolution::default();

    let mut kept: BTreeMap<String, Record> = BTreeMap::new();
    for r in established {
        let Some(account) = r.account().map(str::to_string) else {
            out.records.push(r);
            continue;
        };
        match kept.get(&account) {
            None => {
                kept.insert(account, r);
            }
            Some(current) => {
                out.superseded += 1;
                if policy == BalancePolicy::KeepEarliest && r.date < current.date {
                    kept.insert(account, r);
                }
            }
        }
    }

    let min_dates = earliest_dates(history);
    let mut fresh: BTreeMap<String, Record> = BTreeMap::new();
    let mut pending: BTreeMap<String, Record> = BTreeMap::new();
    for r in placeholders {
        let Some(account) = r.account().map(str::to_string) else {
            out.pending += 1;
            out.records.push(r);
            continue;
        };
        if kept.contains_key(&account) || fresh.contains_key(&account) {
            out.superseded += 1;
            continue;
        }
        let resolved = min_dates
            .get(&account)
            .and_then(|d| opening_balance_date(*d, lookback_periods));
        match resolved {
            Some(date) => {
                debug!(account = %account, %date, "resolved opening balance");
                if pending.remove(&account).is_some() {
                    out.superseded += 1;
                }
                fresh.insert(account, with_opening_balance(r, date));
                out.resolved += 1;
            }
            None if pending.contains_key(&account) => out.superseded += 1,
            None => {
                info!(account = %account, "opening balance left pending: no dated transactions yet");
                pending.insert(account, r);
            }
        }
    }

    out.pending += pending.len();
    out.records.extend(kept.into_values());
    out.records.extend(fresh.into_values());
    out.records.extend(pending.into_values());
    out
}

fn with_opening_balance(mut record: Record, date: NaiveDate) -> Record {
    record.date = RowDate::Valid(date);
    record
        .fields
        .insert(MEMO_COLUMN.to_string(), BEGINNING_BALANCE.to_string());
    record
}
