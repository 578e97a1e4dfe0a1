use comfy_table::{Cell, Table};

use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::models::RecordSet;
use crate::store::fingerprint;

pub struct SnapshotSummary {
    pub rows: usize,
    pub dated: usize,
    pub non_dated: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub opening_balances: usize,
    pub pending_balances: usize,
    pub fingerprint: String,
}

pub fn summarize(set: &RecordSet) -> SnapshotSummary {
    let dates: Vec<_> = set.records.iter().filter_map(|r| r.date.valid()).collect();
    SnapshotSummary {
        rows: set.len(),
        dated: dates.len(),
        non_dated: set.len() - dates.len(),
        first_date: dates.iter().min().map(|d| d.to_string()),
        last_date: dates.iter().max().map(|d| d.to_string()),
        opening_balances: set.records.iter().filter(|r| r.is_opening_balance()).count(),
        pending_balances: set.records.iter().filter(|r| r.is_placeholder()).count(),
        fingerprint: fingerprint(set),
    }
}

pub fn run(global: &GlobalArgs) -> Result<()> {
    let settings = global.load_settings()?;
    let ws = settings.workspace();

    println!("Sync type:  {}", settings.sync_type);
    println!("Input:      {}", ws.input_dir.display());
    println!("Snapshots:  {}", ws.snapshot_dir.display());
    println!("Exports:    {}", ws.output_dir.display());
    println!();

    let mut table = Table::new();
    table.set_header(vec![
        "Stream", "Kind", "Rows", "Dated", "Non-dated", "From", "To", "Opening", "Pending", "Fingerprint",
    ]);
    for stream in &settings.streams {
        let kind = stream
            .kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|_| "?".to_string());
        let Some(snapshot) = ws.read_snapshot(&stream.name) else {
            table.add_row(vec![Cell::new(&stream.name), Cell::new(kind), Cell::new("(no snapshot)")]);
            continue;
        };
        let s = summarize(&snapshot);
        table.add_row(vec![
            Cell::new(&stream.name),
            Cell::new(kind),
            Cell::new(s.rows),
            Cell::new(s.dated),
            Cell::new(s.non_dated),
            Cell::new(s.first_date.unwrap_or_default()),
            Cell::new(s.last_date.unwrap_or_default()),
            Cell::new(s.opening_balances),
            Cell::new(s.pending_balances),
            Cell::new(&s.fingerprint[..12]),
        ]);
    }
    println!("Snapshots\n{table}");
    Ok(())
}
