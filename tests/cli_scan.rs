use std::fs;
use std::process::Command;

use tempfile::tempdir;

fn ldindex() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ldindex"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn invert_prints_consecutive_pairs() {
    let output = ldindex()
        .args(["invert", "8", "--count", "2", "--window", "4", "--step", "3"])
        .output()
        .expect("run ldindex invert");

    assert!(output.status.success(), "CLI exited with {:?}", output.status);
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert_eq!(stdout, "index\ti\tj\tperiod\n8\t2\t4\t0\n9\t0\t1\t1\n");
}

#[test]
fn invert_rejects_negative_index() {
    let output = ldindex()
        .args(["invert", "-1", "--window", "4", "--step", "3"])
        .output()
        .expect("run ldindex invert");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("non-negative"), "unexpected stderr: {stderr}");
}

#[test]
fn plan_rejects_zero_workers_before_saving() {
    let tmp = tempdir().expect("temporary directory");
    let config_path = tmp.path().join("scan.toml");

    let output = ldindex()
        .args(["plan", "--window", "4", "--step", "3", "--sites", "10"])
        .args(["--workers", "0", "--save"])
        .arg(&config_path)
        .output()
        .expect("run ldindex plan");

    assert!(!output.status.success(), "plan accepted zero workers");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("out of range"), "unexpected stderr: {stderr}");
    assert!(!config_path.exists(), "scan.toml written for an invalid plan");
}

#[test]
fn pack_prints_flat_index() {
    let output = ldindex()
        .args(["pack", "1", "3", "1000000000000", "--window", "4", "--step", "3"])
        .output()
        .expect("run ldindex pack");

    assert!(output.status.success(), "CLI exited with {:?}", output.status);
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert_eq!(stdout.trim(), (9_000_000_000_000u64 + 5).to_string());
}

#[test]
fn plan_then_scan_writes_every_pair() {
    let tmp = tempdir().expect("temporary directory");
    let config_path = tmp.path().join("scan.toml");
    let out_path = tmp.path().join("pairs.tsv");

    let status = ldindex()
        .args(["plan", "--window", "4", "--step", "3", "--sites", "10"])
        .args(["--workers", "3", "--assignment", "strided", "--save"])
        .arg(&config_path)
        .status()
        .expect("run ldindex plan");
    assert!(status.success(), "plan exited with {status:?}");
    assert!(config_path.exists(), "scan.toml missing");

    let status = ldindex()
        .args(["scan", "--config"])
        .arg(&config_path)
        .arg("--out")
        .arg(&out_path)
        .status()
        .expect("run ldindex scan");
    assert!(status.success(), "scan exited with {status:?}");

    let written = fs::read_to_string(&out_path).expect("read scan output");
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("period\ti\tj\tleft\tright\tdistance"));
    assert_eq!(lines.next(), Some("0\t0\t1\t0\t1\t1"));
    // 9 + 9 + 6 pairs: period 2 loses the pairs reaching site 10, and period 3
    // starts at the last site.
    assert_eq!(lines.count(), 23);
}
