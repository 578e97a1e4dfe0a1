use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dates::{RowDate, BEGINNING_BALANCE};

pub const DATE_COLUMN: &str = "Date";
pub const ACCOUNT_ID_COLUMN: &str = "AccountId";
pub const ACCOUNT_NUMBER_COLUMN: &str = "Account#";
pub const MEMO_COLUMN: &str = "Memo";
pub const TRANSACTION_TYPE_COLUMN: &str = "TransactionTypeId";
pub const CATEGORIES_COLUMN: &str = "Categories";

pub const GENERAL_LEDGER_STREAM: &str = "GeneralLedgerAccrualReport";
pub const GENERAL_LEDGER_CASH_STREAM: &str = "GeneralLedgerCashReport";
pub const PROFIT_AND_LOSS_STREAM: &str = "ProfitAndLossDetailReport";

/// `report_periods` counts the current month for the ledger reports.
pub const DEFAULT_LEDGER_REPORT_PERIODS: u32 = 3;
pub const DEFAULT_PNL_REPORT_PERIODS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum ReportKind {
    #[serde(rename = "gl")]
    #[value(name = "gl")]
    GeneralLedger,
    #[serde(rename = "gl-cash")]
    #[value(name = "gl-cash")]
    GeneralLedgerCash,
    #[serde(rename = "pnl")]
    #[value(name = "pnl")]
    ProfitAndLoss,
}

pub const ALL_KINDS: &[ReportKind] = &[
    ReportKind::GeneralLedger,
    ReportKind::GeneralLedgerCash,
    ReportKind::ProfitAndLoss,
];

impl ReportKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::GeneralLedger => "gl",
            Self::GeneralLedgerCash => "gl-cash",
            Self::ProfitAndLoss => "pnl",
        }
    }

    pub fn default_stream(&self) -> &'static str {
        match self {
            Self::GeneralLedger => GENERAL_LEDGER_STREAM,
            Self::GeneralLedgerCash => GENERAL_LEDGER_CASH_STREAM,
            Self::ProfitAndLoss => PROFIT_AND_LOSS_STREAM,
        }
    }

    pub fn for_stream(stream: &str) -> Option<ReportKind> {
        ALL_KINDS.iter().find(|k| k.default_stream() == stream).copied()
    }

    pub fn default_report_periods(&self) -> u32 {
        match self {
            Self::GeneralLedger | Self::GeneralLedgerCash => DEFAULT_LEDGER_REPORT_PERIODS,
            Self::ProfitAndLoss => DEFAULT_PNL_REPORT_PERIODS,
        }
    }

    /// Months before the current one that every sync re-supplies.
    pub fn lookback_periods(&self, report_periods: Option<u32>) -> u32 {
        let periods = report_periods.unwrap_or_else(|| self.default_report_periods());
        match self {
            Self::GeneralLedger | Self::GeneralLedgerCash => periods.saturating_sub(1),
            Self::ProfitAndLoss => periods,
        }
    }

    pub fn tracks_beginning_balance(&self) -> bool {
        matches!(self, Self::GeneralLedger | Self::GeneralLedgerCash)
    }

    /// Whether a run without extract data re-exports the existing snapshot.
    pub fn retains_snapshot_without_extract(&self) -> bool {
        matches!(self, Self::GeneralLedgerCash)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    #[value(name = "full_sync")]
    FullSync,
    #[default]
    #[value(name = "incremental_sync")]
    IncrementalSync,
}

impl SyncType {
    pub fn parse(raw: &str) -> Option<SyncType> {
        match raw.trim() {
            "full_sync" => Some(Self::FullSync),
            "incremental_sync" => Some(Self::IncrementalSync),
            _ => None,
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullSync => write!(f, "full_sync"),
            Self::IncrementalSync => write!(f, "incremental_sync"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Csv,
    Jsonl,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
        }
    }
}

/// One report row. `Date` lives in `date`; every other column is in `fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub date: RowDate,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(date: RowDate) -> Self {
        Self {
            date,
            fields: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.fields.insert(column.to_string(), value.to_string());
        self
    }

    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    /// `AccountId`, falling back to `Account#` for reports without it.
    pub fn account(&self) -> Option<&str> {
        [ACCOUNT_ID_COLUMN, ACCOUNT_NUMBER_COLUMN]
            .iter()
            .map(|c| self.get(c).trim())
            .find(|v| !v.is_empty())
    }

    pub fn memo(&self) -> &str {
        self.get(MEMO_COLUMN)
    }

    pub fn is_placeholder(&self) -> bool {
        self.date.is_beginning_balance()
    }

    /// A placeholder that has already been given a concrete date.
    pub fn is_opening_balance(&self) -> bool {
        self.date.is_valid() && self.memo() == BEGINNING_BALANCE
    }

    /// Identity of a row without a usable date.
    pub fn identity_key(&self) -> (String, String, String, String) {
        (
            self.date.render(),
            self.get(ACCOUNT_NUMBER_COLUMN).to_string(),
            self.get(TRANSACTION_TYPE_COLUMN).to_string(),
            self.get(CATEGORIES_COLUMN).to_string(),
        )
    }

    /// Cell values in `columns` order with `Date` rendered as text.
    pub fn render(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| {
                if c == DATE_COLUMN {
                    self.date.render()
                } else {
                    self.get(c).to_string()
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        let mut set = Self { columns, records };
        set.ensure_column(DATE_COLUMN);
        set
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ensure_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }
}

/// Union of two column lists in first-seen order.
pub fn union_columns(first: &[String], second: &[String]) -> Vec<String> {
    let mut columns = first.to_vec();
    for c in second {
        if !columns.contains(c) {
            columns.push(c.clone());
        }
    }
    columns
}
