use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write_matrix(dir: &Path, text: &str) -> std::path::PathBuf {
    let path = dir.join("matrix.txt");
    fs::write(&path, text).unwrap();
    path
}

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("nearest-neighbours").unwrap();
    cmd.env_remove("KNN_THREADS").env_remove("KNN_UNORDERED").env("RUST_LOG", "warn");
    cmd
}

#[test]
fn writes_rows_to_stdout_and_mapping_to_file() {
    let dir = tempdir().unwrap();
    let matrix = write_matrix(dir.path(), "1 2,10\n2 3,10\n3 4,10\n");
    let mapping = dir.path().join("mapping.txt");
    bin()
        .arg(&matrix)
        .arg("2")
        .arg(&mapping)
        .assert()
        .success()
        .stdout("0: 1,41.7032 2,83.4065\n1: 0,41.7032 2,41.7032\n2: 1,41.7032 3,41.7032\n3: 2,41.7032 1,83.4065\n");
    assert_eq!(fs::read_to_string(&mapping).unwrap(), "1 0\n2 1\n3 2\n4 3\n");
}

#[test]
fn requires_exactly_three_arguments() {
    let dir = tempdir().unwrap();
    let matrix = write_matrix(dir.path(), "1 2,1\n");
    bin().arg(&matrix).arg("1").assert().failure().stdout("");
    bin()
        .arg(&matrix)
        .arg("1")
        .arg(dir.path().join("m.txt"))
        .arg("extra")
        .assert()
        .failure();
}

#[test]
fn rejects_k_above_vertex_count() {
    let dir = tempdir().unwrap();
    let matrix = write_matrix(dir.path(), "1 2,3 3,4\n");
    bin()
        .arg(&matrix)
        .arg("3")
        .arg(dir.path().join("m.txt"))
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("requested 3 neighbours"));
}

#[test]
fn rejects_zero_weight_and_malformed_rows() {
    let dir = tempdir().unwrap();
    let zero = write_matrix(dir.path(), "1 2,0\n");
    bin()
        .arg(&zero)
        .arg("1")
        .arg(dir.path().join("m.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("raw weight 0 at line 1"));

    let bad = write_matrix(dir.path(), "1 2,5\nfoo 3,1\n");
    bin()
        .arg(&bad)
        .arg("1")
        .arg(dir.path().join("m.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed row at line 2"));
}

#[test]
fn missing_input_file_fails() {
    let dir = tempdir().unwrap();
    bin()
        .arg(dir.path().join("nope.txt"))
        .arg("1")
        .arg(dir.path().join("m.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("I/O error"));
}

#[test]
fn unordered_env_and_summary_file() {
    let dir = tempdir().unwrap();
    let matrix = write_matrix(dir.path(), "1 2,3 3,5\n2 4,2\n5 6,9\n");
    let summary = dir.path().join("summary.json");
    let out = bin()
        .env("KNN_UNORDERED", "1")
        .env("KNN_THREADS", "2")
        .arg(&matrix)
        .arg("3")
        .arg(dir.path().join("m.txt"))
        .arg("--summary")
        .arg(&summary)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let mut sources: Vec<usize> = text
        .lines()
        .map(|l| l.split_once(':').unwrap().0.parse().unwrap())
        .collect();
    sources.sort_unstable();
    assert_eq!(sources, (0..6).collect::<Vec<_>>());
    assert!(text.lines().all(|l| l.split(' ').count() == 4));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["vertices"], 6);
    assert_eq!(json["ordered"], false);
    assert_eq!(json["threads"], 2);
    assert_eq!(json["rows_written"], 6);
}

#[test]
fn fatal_error_is_reported_once() {
    let dir = tempdir().unwrap();
    let zero = write_matrix(dir.path(), "1 2,5\n2 3,0\n");
    let out = bin()
        .env("RUST_LOG", "info")
        .arg(&zero)
        .arg("1")
        .arg(dir.path().join("m.txt"))
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(out).unwrap();
    assert_eq!(stderr.matches("raw weight 0 at line 2").count(), 1, "{stderr}");
    assert!(stderr.lines().any(|l| l.starts_with("nearest-neighbours: ")));
}
