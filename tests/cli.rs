use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const GL: &str = "GeneralLedgerAccrualReport";

struct Job {
    dir: tempfile::TempDir,
}

impl Job {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("snapstitch").unwrap();
        cmd.current_dir(self.path())
            .env("NO_COLOR", "1")
            .env_remove("SYNC_TYPE")
            .env_remove("base_input_dir")
            .env_remove("snapshot_dir")
            .env_remove("output_dir")
            .env_remove("RUST_LOG")
            .args(["--config", "config.json", "--as-of", "2024-06-15"]);
        cmd
    }

    fn extract(&self, stream: &str, content: &str) {
        let dir = self.path().join("sync-output");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{stream}.csv")), content).unwrap();
    }

    fn snapshot_path(&self, stream: &str) -> PathBuf {
        self.path().join("snapshots").join(format!("{stream}.snapshot.csv"))
    }

    fn snapshot_lines(&self, stream: &str) -> Vec<String> {
        let content = std::fs::read_to_string(self.snapshot_path(stream)).unwrap();
        let mut lines: Vec<String> = content.lines().skip(1).map(str::to_string).collect();
        lines.sort();
        lines
    }
}

const FULL_EXTRACT: &str = "\
Date,AccountId,Account#,TransactionTypeId,Categories,Memo,Amount
Beginning Balance,A100,A100,,,,1000.00
2024-01-05,A100,A100,1,Ops,Rent,-500.00
2024-02-05,A100,A100,1,Ops,Rent,-500.00
2024-05-05,A100,A100,1,Ops,Rent,-500.00
";

#[test]
fn test_first_run_resolves_beginning_balance() {
    let job = Job::new();
    job.extract(GL, FULL_EXTRACT);
    job.cmd()
        .args(["run", GL])
        .assert()
        .success()
        .stdout(predicate::str::contains("MERGED"))
        .stdout(predicate::str::contains("1 resolved"));

    let lines = job.snapshot_lines(GL);
    assert_eq!(lines.len(), 4);
    assert!(lines.contains(&"2023-09-30,A100,A100,,,Beginning Balance,1000.00".to_string()));
    assert!(job.path().join("etl-output").join(format!("{GL}.csv")).exists());
}

#[test]
fn test_incremental_run_replaces_volatile_window() {
    let job = Job::new();
    job.extract(GL, FULL_EXTRACT);
    job.cmd().args(["run", GL, "--sync-type", "full_sync"]).assert().success();

    job.extract(
        GL,
        "Date,AccountId,Account#,TransactionTypeId,Categories,Memo,Amount\n\
         Beginning Balance,A100,A100,,,,1000.00\n\
         2024-05-05,A100,A100,1,Ops,Rent,-550.00\n\
         2024-06-01,A100,A100,1,Ops,Rent,-550.00\n",
    );
    job.cmd().args(["run", GL]).assert().success();

    let lines = job.snapshot_lines(GL);
    assert_eq!(
        lines,
        vec![
            "2023-09-30,A100,A100,,,Beginning Balance,1000.00",
            "2024-01-05,A100,A100,1,Ops,Rent,-500.00",
            "2024-02-05,A100,A100,1,Ops,Rent,-500.00",
            "2024-05-05,A100,A100,1,Ops,Rent,-550.00",
            "2024-06-01,A100,A100,1,Ops,Rent,-550.00",
        ]
    );
}

#[test]
fn test_rerun_is_idempotent() {
    let job = Job::new();
    job.extract(GL, FULL_EXTRACT);
    job.cmd().args(["run", GL]).assert().success();
    let first = job.snapshot_lines(GL);
    job.cmd().args(["run", GL]).assert().success();
    assert_eq!(job.snapshot_lines(GL), first);
}

#[test]
fn test_missing_extract_writes_nothing() {
    let job = Job::new();
    job.cmd()
        .args(["run", "ProfitAndLossDetailReport"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to reconcile"));
    assert!(!job.snapshot_path("ProfitAndLossDetailReport").exists());
}

#[test]
fn test_unknown_stream_needs_kind() {
    let job = Job::new();
    job.cmd()
        .args(["run", "BalanceSheet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown stream"));

    job.extract("BalanceSheet", "Date,Amount\n2024-05-01,1\n");
    job.cmd()
        .args(["run", "BalanceSheet", "--kind", "pnl", "--format", "jsonl"])
        .assert()
        .success();
    assert!(job.path().join("etl-output").join("BalanceSheet.jsonl").exists());
}

#[test]
fn test_sync_type_from_environment() {
    let job = Job::new();
    job.extract(GL, FULL_EXTRACT);
    job.cmd().args(["run", GL]).assert().success();

    // A full sync replaces history, so the stable rows disappear with it.
    job.extract(
        GL,
        "Date,AccountId,Account#,TransactionTypeId,Categories,Memo,Amount\n\
         2024-06-01,A100,A100,1,Ops,Rent,-550.00\n",
    );
    job.cmd().env("SYNC_TYPE", "full_sync").args(["run", GL]).assert().success();
    assert_eq!(job.snapshot_lines(GL), vec!["2024-06-01,A100,A100,1,Ops,Rent,-550.00"]);
}

#[test]
fn test_run_all_reports_each_stream() {
    let job = Job::new();
    std::fs::write(
        job.path().join("config.json"),
        r#"{"report_periods": 3, "streams": [
            {"name": "GeneralLedgerAccrualReport"},
            {"name": "GeneralLedgerCashReport"},
            {"name": "ProfitAndLossDetailReport", "export_format": "jsonl"}
        ]}"#,
    )
    .unwrap();
    job.extract(GL, FULL_EXTRACT);
    job.extract("ProfitAndLossDetailReport", "Date,Amount\n2024-05-01,10\n");
    job.cmd()
        .arg("run-all")
        .assert()
        .success()
        .stdout(predicate::str::contains("MERGED"))
        .stdout(predicate::str::contains("nothing to reconcile"));
    assert!(job.path().join("etl-output").join("ProfitAndLossDetailReport.jsonl").exists());
}

#[test]
fn test_run_all_fails_when_a_stream_fails() {
    let job = Job::new();
    job.extract(GL, "When,Amount\n2024-05-01,1\n");
    job.extract("ProfitAndLossDetailReport", "Date,Amount\n2024-05-01,10\n");
    job.cmd()
        .arg("run-all")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 stream(s) failed"));
    assert!(!job.snapshot_path(GL).exists());
    assert!(job.snapshot_path("ProfitAndLossDetailReport").exists());
}

#[test]
fn test_window_prints_cutoff() {
    let job = Job::new();
    job.cmd()
        .args(["window", "--kind", "gl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-04-01"));
}

#[test]
fn test_status_lists_snapshots() {
    let job = Job::new();
    job.extract(GL, FULL_EXTRACT);
    job.cmd().args(["run", GL]).assert().success();
    job.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(GL))
        .stdout(predicate::str::contains("2023-09-30"))
        .stdout(predicate::str::contains("(no snapshot)"));
}

#[test]
fn test_init_writes_config_and_dirs() {
    let job = Job::new();
    job.cmd().arg("init").assert().success();
    assert!(job.path().join("config.json").exists());
    assert!(job.path().join("snapshots").is_dir());
    assert!(job.path().join("etl-output").is_dir());
    job.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Keeping existing config"));
}

#[test]
fn test_invalid_as_of_is_rejected() {
    let job = Job::new();
    let mut cmd = Command::cargo_bin("snapstitch").unwrap();
    cmd.current_dir(job.path())
        .args(["--config", "config.json", "--as-of", "someday", "window"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}
