#![cfg(feature = "cli")]

mod common;

use assert_cmd::Command;
use common::{QUERY, STRUCTURE_ID, snapshot};
use gantt_leveler::persistence::{FileGanttStore, load_results_from_json};
use predicates::prelude::*;
use predicates::str::contains as str_contains;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

/// Temp directory holding `leveler.json` and the `gantt.json` snapshot it points at.
fn workspace(parallel_projects: usize) -> TempDir {
    let dir = tempdir().expect("create temp dir");
    FileGanttStore::from_snapshot(snapshot())
        .save_to(dir.path().join("gantt.json"))
        .expect("write snapshot");
    let config = serde_json::json!({
        "source": { "kind": "json", "path": "gantt.json" },
        "structures": {
            "ops": { "id": STRUCTURE_ID, "query": QUERY, "parallel_projects": parallel_projects }
        }
    });
    fs::write(dir.path().join("leveler.json"), config.to_string()).expect("write config");
    dir
}

#[allow(deprecated)]
fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.env_remove("GANTT_LEVELER_CONFIG")
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(dir.join("leveler.json"));
    cmd
}

fn stored_delay_ms(dir: &Path, row_id: i64) -> i64 {
    FileGanttStore::open(dir.join("gantt.json"))
        .unwrap()
        .snapshot()
        .structure(STRUCTURE_ID)
        .unwrap()
        .row(row_id)
        .unwrap()
        .leveling_delay_ms
}

#[test]
fn cli_run_writes_delays_back_to_the_snapshot() {
    let dir = workspace(2);
    cli(dir.path())
        .args(["run", "--today", "20240101"])
        .assert()
        .success()
        .stdout(str_contains("ops: structure=42"))
        .stdout(str_contains("leveled=3"))
        .stdout(str_contains("written=3"))
        .stdout(str_contains("skipped (not in structure)"));

    assert_eq!(stored_delay_ms(dir.path(), 501), 0);
    assert_eq!(stored_delay_ms(dir.path(), 503), 28_800_000);
}

#[test]
fn cli_dry_run_leaves_the_snapshot_alone() {
    let dir = workspace(1);
    cli(dir.path())
        .args(["run", "-s", "ops", "--today", "20240101", "--dry-run"])
        .assert()
        .success()
        .stdout(str_contains("written=0"))
        .stdout(str_contains("delay=16h"));

    assert_eq!(stored_delay_ms(dir.path(), 503), 0);
}

#[test]
fn cli_exports_results() {
    let dir = workspace(2);
    let export = dir.path().join("results.json");
    cli(dir.path())
        .args(["run", "--today", "20240101", "--dry-run", "--export"])
        .arg(&export)
        .assert()
        .success()
        .stdout(str_contains("Exported 3 results"));

    let results = load_results_from_json(&export).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[2].issue_key, "OPS-3");
}

#[test]
fn cli_reports_working_duration() {
    let dir = workspace(1);
    cli(dir.path())
        .args(["duration", "-s", "ops", "20240101", "20240108"])
        .assert()
        .success()
        .stdout(str_contains("40h working time in [20240101, 20240108) (Office calendar)"));
}

#[test]
fn cli_fails_on_unknown_structure() {
    let dir = workspace(1);
    cli(dir.path())
        .args(["run", "-s", "mobile"])
        .assert()
        .failure()
        .stderr(str_contains("no structure named 'mobile'"));
}

#[test]
fn cli_fails_when_no_track_is_available() {
    let dir = workspace(0);
    cli(dir.path())
        .args(["run", "--today", "20240101"])
        .assert()
        .failure()
        .stderr(str_contains("failed to level structure 'ops'"))
        .stderr(str_contains("no slots"));
}

#[test]
fn cli_fails_on_missing_config() {
    let dir = tempdir().unwrap();
    cli(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(str_contains("failed to load configuration"));
}

#[test]
fn cli_honours_per_target_log_filters() {
    let dir = workspace(2);
    cli(dir.path())
        .env("RUST_LOG", "gantt_leveler=info")
        .args(["run", "--today", "20240101", "--dry-run"])
        .assert()
        .success()
        .stderr(str_contains("seeded tracks"));

    cli(dir.path())
        .env("RUST_LOG", "gantt_leveler=warn")
        .args(["run", "--today", "20240101", "--dry-run"])
        .assert()
        .success()
        .stderr(str_contains("seeded tracks").not())
        .stderr(str_contains("issue is not in the structure"));
}
