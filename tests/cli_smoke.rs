use assert_cmd::Command;
use std::fs;
use tempfile::tempdir;

fn learnclock(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("learnclock").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

#[test]
fn goals_round_trip_through_the_cli() {
    let tmp = tempdir().unwrap();

    let out = learnclock(tmp.path())
        .args(["add-goal", "reading", "1.5"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("Added countdown reading"));

    let out = learnclock(tmp.path()).arg("goals").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("reading"));
    assert!(stdout.contains("remaining 01:30:00"));
}

#[test]
fn add_goal_rejects_bad_input() {
    let tmp = tempdir().unwrap();

    let out = learnclock(tmp.path())
        .args(["add-goal", "reading", "soon"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("valid number"));

    learnclock(tmp.path())
        .args(["add-goal", "reading", "1"])
        .assert()
        .success();
    learnclock(tmp.path())
        .args(["add-goal", "reading", "2"])
        .assert()
        .failure();
}

#[test]
fn history_starts_empty() {
    let tmp = tempdir().unwrap();
    let out = learnclock(tmp.path()).arg("history").output().unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "No finished days yet\n");
}

#[test]
fn export_writes_csv_header() {
    let tmp = tempdir().unwrap();
    let csv_path = tmp.path().join("out.csv");

    learnclock(tmp.path())
        .args(["--backend", "sqlite", "add-goal", "piano", "1"])
        .assert()
        .success();
    learnclock(tmp.path())
        .args(["--backend", "sqlite", "export"])
        .arg(&csv_path)
        .assert()
        .success();

    let body = fs::read_to_string(&csv_path).unwrap();
    assert!(body.starts_with("series,label,hours,seconds"));
    assert!(tmp.path().join("db").join("learnclock.db").exists());
}
