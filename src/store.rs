use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::dates::RowDate;
use crate::error::{Result, SnapError};
use crate::models::{union_columns, ExportFormat, Record, RecordSet, DATE_COLUMN};

const SNAPSHOT_SUFFIX: &str = ".snapshot.csv";

/// Directory layout of one sync job: raw extracts in, snapshots and exports out.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub input_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Workspace {
    pub fn new(input_dir: impl Into<PathBuf>, snapshot_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            snapshot_dir: snapshot_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.snapshot_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    pub fn snapshot_path(&self, stream: &str) -> PathBuf {
        self.snapshot_dir.join(format!("{stream}{SNAPSHOT_SUFFIX}"))
    }

    pub fn export_path(&self, stream: &str, format: ExportFormat) -> PathBuf {
        self.output_dir.join(format!("{stream}.{}", format.extension()))
    }

    /// `<stream>.csv`, else the last `<stream>-*.csv` by name.
    pub fn extract_path(&self, stream: &str) -> Option<PathBuf> {
        let exact = self.input_dir.join(format!("{stream}.csv"));
        if exact.is_file() {
            return Some(exact);
        }
        let prefix = format!("{stream}-");
        let entries = std::fs::read_dir(&self.input_dir).ok()?;
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".csv"))
            })
            .max()
    }

    /// Rows the current sync produced, or `None` when the stream was not synced.
    pub fn read_extract(&self, stream: &str) -> Result<Option<RecordSet>> {
        let Some(path) = self.extract_path(stream) else {
            debug!(stream, dir = %self.input_dir.display(), "no extract file");
            return Ok(None);
        };
        read_records(&path, stream).map(Some)
    }

    /// The previous run's snapshot. Unreadable snapshots count as absent.
    pub fn read_snapshot(&self, stream: &str) -> Option<RecordSet> {
        let path = self.snapshot_path(stream);
        if !path.exists() {
            return None;
        }
        match read_records(&path, stream) {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(stream, path = %path.display(), error = %e, "ignoring unreadable snapshot");
                None
            }
        }
    }

    /// Persist `set` as the stream's snapshot. Without `overwrite` the rows
    /// are appended to whatever snapshot already exists.
    pub fn write_snapshot(&self, stream: &str, set: &RecordSet, overwrite: bool) -> Result<PathBuf> {
        let path = self.snapshot_path(stream);
        let combined;
        let existing = if overwrite { None } else { self.read_snapshot(stream) };
        let to_write = match existing {
            Some(existing) => {
                let columns = union_columns(&existing.columns, &set.columns);
                let records = existing.records.into_iter().chain(set.records.iter().cloned()).collect();
                combined = RecordSet::new(columns, records);
                &combined
            }
            _ => set,
        };
        write_atomic(&path, &to_csv(to_write)?)?;
        Ok(path)
    }

    pub fn write_export(&self, set: &RecordSet, stream: &str, format: ExportFormat) -> Result<PathBuf> {
        let path = self.export_path(stream, format);
        let bytes = match format {
            ExportFormat::Csv => to_csv(set)?,
            ExportFormat::Jsonl => to_jsonl(set)?,
        };
        write_atomic(&path, &bytes)?;
        Ok(path)
    }
}

pub fn read_records(path: &Path, stream: &str) -> Result<RecordSet> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Ok(RecordSet::new(vec![DATE_COLUMN.to_string()], Vec::new()));
    }
    if !headers.iter().any(|h| h == DATE_COLUMN) {
        return Err(SnapError::MissingColumn {
            stream: stream.to_string(),
            column: DATE_COLUMN.to_string(),
        });
    }

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let mut record = Record::new(RowDate::Unparsed(String::new()));
        for (i, column) in headers.iter().enumerate() {
            let value = row.get(i).unwrap_or("");
            if column == DATE_COLUMN {
                record.date = RowDate::parse(value);
            } else {
                record.fields.insert(column.clone(), value.to_string());
            }
        }
        records.push(record);
    }
    debug!(stream, rows = records.len(), path = %path.display(), "read records");
    Ok(RecordSet::new(headers, records))
}

pub fn to_csv(set: &RecordSet) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&set.columns)?;
    for r in &set.records {
        wtr.write_record(r.render(&set.columns))?;
    }
    Ok(wtr.into_inner().map_err(|e| e.into_error())?)
}

pub fn to_jsonl(set: &RecordSet) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for r in &set.records {
        let row: serde_json::Map<String, serde_json::Value> = set
            .columns
            .iter()
            .cloned()
            .zip(r.render(&set.columns).into_iter().map(serde_json::Value::String))
            .collect();
        serde_json::to_writer(&mut out, &row)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Write to a sibling temp file, then rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// SHA-256 over the rendered rows, independent of row and column order.
pub fn fingerprint(set: &RecordSet) -> String {
    let mut columns = set.columns.clone();
    columns.sort();
    let mut lines: Vec<String> = set
        .records
        .iter()
        .map(|r| r.render(&columns).join("\u{1f}"))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    hasher.update(columns.join("\u{1f}").as_bytes());
    for line in &lines {
        hasher.update(b"\n");
        hasher.update(line.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn workspace(dir: &Path) -> Workspace {
        Workspace::new(dir.join("sync-output"), dir.join("snapshots"), dir.join("etl-output"))
    }

    fn write_extract(ws: &Workspace, name: &str, content: &str) -> PathBuf {
        std::fs::create_dir_all(&ws.input_dir).unwrap();
        let path = ws.input_dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn sample() -> RecordSet {
        RecordSet::new(
            vec!["Date".into(), "Account#".into(), "Amount".into()],
            vec![
                Record::new(RowDate::parse("2024-01-05")).with("Account#", "42").with("Amount", "1,000.00"),
                Record::new(RowDate::parse("Beginning Balance")).with("Account#", "42").with("Amount", "5"),
            ],
        )
    }

    #[test]
    fn test_missing_extract_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        assert!(ws.read_extract("GeneralLedgerAccrualReport").unwrap().is_none());
    }

    #[test]
    fn test_header_only_extract_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        write_extract(&ws, "Pnl.csv", "Date,Amount\n");
        let set = ws.read_extract("Pnl").unwrap().unwrap();
        assert!(set.is_empty());
        write_extract(&ws, "Pnl.csv", "");
        assert!(ws.read_extract("Pnl").unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_extract_parses_dates() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        write_extract(
            &ws,
            "GL.csv",
            "Date,Account#,Amount\n2024-01-05,42,10\nBeginning Balance,42,5\n???,43,1\n",
        );
        let set = ws.read_extract("GL").unwrap().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.records[0].date, RowDate::Valid(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
        assert!(set.records[1].is_placeholder());
        assert_eq!(set.records[2].date.render(), "N/A-???");
        assert_eq!(set.records[2].get("Account#"), "43");
    }

    #[test]
    fn test_extract_falls_back_to_latest_suffixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        write_extract(&ws, "GL-20240101.csv", "Date,Amount\n2024-01-01,1\n");
        let latest = write_extract(&ws, "GL-20240201.csv", "Date,Amount\n2024-02-01,2\n");
        write_extract(&ws, "GLX.csv", "Date,Amount\n2024-03-01,3\n");
        assert_eq!(ws.extract_path("GL"), Some(latest));
        let exact = write_extract(&ws, "GL.csv", "Date,Amount\n");
        assert_eq!(ws.extract_path("GL"), Some(exact));
    }

    #[test]
    fn test_extract_without_date_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        write_extract(&ws, "GL.csv", "When,Amount\n2024-01-01,1\n");
        let err = ws.read_extract("GL").unwrap_err();
        assert!(matches!(err, SnapError::MissingColumn { .. }));
    }

    #[test]
    fn test_snapshot_roundtrip_renders_dates_uniformly() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let path = ws.write_snapshot("GL", &sample(), true).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Date,Account#,Amount\n2024-01-05,42,\"1,000.00\"\nN/A-Beginning Balance,42,5\n"
        );
        assert!(!path.with_file_name("GL.snapshot.csv.tmp").exists());
        let back = ws.read_snapshot("GL").unwrap();
        assert_eq!(fingerprint(&back), fingerprint(&sample()));
    }

    #[test]
    fn test_unreadable_snapshot_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        std::fs::create_dir_all(&ws.snapshot_dir).unwrap();
        std::fs::write(ws.snapshot_path("GL"), b"Date,Amount\n\xff\xfe,1\n").unwrap();
        assert!(ws.read_snapshot("GL").is_none());
        assert!(ws.read_snapshot("Missing").is_none());
    }

    #[test]
    fn test_write_snapshot_without_overwrite_appends() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.write_snapshot("GL", &sample(), true).unwrap();
        ws.write_snapshot("GL", &sample(), false).unwrap();
        assert_eq!(ws.read_snapshot("GL").unwrap().len(), 4);
        ws.write_snapshot("GL", &sample(), true).unwrap();
        assert_eq!(ws.read_snapshot("GL").unwrap().len(), 2);
    }

    #[test]
    fn test_export_formats() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let csv_path = ws.write_export(&sample(), "GL", ExportFormat::Csv).unwrap();
        assert!(csv_path.ends_with("GL.csv"));
        let json_path = ws.write_export(&sample(), "GL", ExportFormat::Jsonl).unwrap();
        let content = std::fs::read_to_string(json_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["Date"], "2024-01-05");
        assert_eq!(first["Amount"], "1,000.00");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["Date"], "N/A-Beginning Balance");
    }

    #[test]
    fn test_fingerprint_ignores_row_order() {
        let a = sample();
        let mut b = sample();
        b.records.reverse();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        b.records.pop();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.ensure_dirs().unwrap();
        assert!(ws.snapshot_dir.is_dir());
        assert!(ws.output_dir.is_dir());
    }
}
