use comfy_table::{Cell, Table};

use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::models::{ReportKind, ALL_KINDS};
use crate::settings::StreamSettings;

pub fn run(global: &GlobalArgs, kind: Option<ReportKind>) -> Result<()> {
    let settings = global.load_settings()?;
    let today = global.today()?;
    let kinds: Vec<ReportKind> = match kind {
        Some(k) => vec![k],
        None => ALL_KINDS.to_vec(),
    };

    let mut table = Table::new();
    table.set_header(vec!["Kind", "Stream", "Lookback (months)", "Cutoff"]);
    for kind in kinds {
        let stream = settings
            .streams
            .iter()
            .find(|s| s.kind().ok() == Some(kind))
            .cloned()
            .unwrap_or_else(|| StreamSettings::named(kind.default_stream()));
        let config = settings.reconcile_config(&stream, kind, today);
        let window = config.window();
        table.add_row(vec![
            Cell::new(kind),
            Cell::new(&stream.name),
            Cell::new(window.lookback_periods),
            Cell::new(window.cutoff),
        ]);
    }
    println!("As of {today}: rows dated before the cutoff come from the snapshot\n{table}");
    Ok(())
}
