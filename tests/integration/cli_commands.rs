#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const TRAVIS: &str = r#"{
  "regions": [
    { "id": 10, "rank": "state", "name": "Texas" },
    { "id": 1, "rank": "county", "name": "Travis", "parent": 10 },
    { "id": 2, "rank": "county", "name": "Hays", "parent": 10 }
  ],
  "adjacency": [[1, 2]],
  "localities": [
    { "locality_id": 1, "region_id": 1, "name": "Zilker Preserve",
      "last_modified": "2019-05-01T00:00:00Z" },
    { "locality_id": 2, "region_id": 2, "name": "Zilker Park",
      "last_modified": "2024-05-01T00:00:00Z" },
    { "locality_id": 3, "region_id": 2, "name": "Onion Creek",
      "last_modified": "2019-05-01T00:00:00Z" }
  ],
  "domain": [10]
}"#;

fn setup_dataset(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("dataset.json");
    fs::write(&path, contents).expect("write dataset");
    (dir, path)
}

fn config_path(dir: &TempDir) -> PathBuf {
    dir.path().join("config.toml")
}

#[test]
fn run_json_reports_matches_and_summary() {
    let (dir, dataset) = setup_dataset(TRAVIS);
    let output = cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(config_path(&dir))
        .args(["--format", "json", "run"])
        .arg(&dataset)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");

    assert_eq!(json["localities"].as_u64(), Some(3));
    let matches = json["matches"].as_array().expect("matches array");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["base"]["locality_id"].as_u64(), Some(1));
    assert_eq!(matches[0]["test"]["locality_id"].as_u64(), Some(2));
    let subset = &matches[0]["phonetic_matches"][0]["base_subsets"][0];
    assert_eq!(subset["first_char_index"].as_u64(), Some(0));
    assert_eq!(subset["last_char_index_plus_one"].as_u64(), Some(6));

    assert_eq!(json["summary"]["matches_emitted"].as_u64(), Some(1));
    assert_eq!(json["summary"]["localities_evicted"].as_u64(), Some(3));
    let regions: Vec<u64> = json["regions"]
        .as_array()
        .expect("regions array")
        .iter()
        .filter_map(Value::as_u64)
        .collect();
    assert_eq!(regions, vec![1, 2]);
}

#[test]
fn run_since_skips_unchanged_pairs() {
    let (dir, dataset) = setup_dataset(TRAVIS);
    let output = cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(config_path(&dir))
        .args(["--format", "json", "run", "--since", "2030-01-01"])
        .arg(&dataset)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["matches"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["summary"]["comparisons"].as_u64(), Some(0));
}

#[test]
fn run_text_marks_matched_words() {
    let (dir, dataset) = setup_dataset(TRAVIS);
    let output = cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(config_path(&dir))
        .args(["--color", "never", "run"])
        .arg(&dataset)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("match 1: locality 1 ~ locality 2"), "{text}");
    assert!(text.contains("[Zilker] Preserve"), "{text}");
    assert!(text.contains("[Zilker] Park"), "{text}");
    assert!(text.contains("Summary"), "{text}");
}

#[test]
fn run_rejects_bad_since_date() {
    let (_dir, dataset) = setup_dataset(TRAVIS);
    cargo_bin_cmd!("consolidator")
        .args(["run", "--since", "last tuesday"])
        .arg(&dataset)
        .assert()
        .failure();
}

#[test]
fn run_fails_on_missing_dataset() {
    let dir = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(config_path(&dir))
        .arg("run")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("error:"), "{stderr}");
}

#[test]
fn run_fails_on_unknown_domain_region() {
    let (dir, dataset) = setup_dataset(TRAVIS);
    cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(config_path(&dir))
        .args(["run", "--domain", "99"])
        .arg(&dataset)
        .assert()
        .failure();
}

#[test]
fn phonetic_json_lists_words_and_codes() {
    let dir = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(config_path(&dir))
        .args(["--format", "json", "phonetic", "Bee Cave"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["words"], serde_json::json!(["bee", "cave"]));
    assert_eq!(json["phonetic_codes"], serde_json::json!(["B", "K1"]));
    assert_eq!(json["sorted_phonetic_series"].as_str(), Some("B K1"));
}

#[test]
fn config_show_reflects_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = config_path(&dir);
    fs::write(&path, "[consolidation]\nyield_interval = 7\n").expect("write config");

    let output = cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(&path)
        .args(["--format", "json", "config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["consolidation"]["yield_interval"].as_u64(), Some(7));
    assert_eq!(json["output"]["format"].as_str(), Some("text"));
}

#[test]
fn config_init_writes_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("config.toml");
    cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(&path)
        .args(["--color", "never", "config", "init"])
        .assert()
        .success();
    let written = fs::read_to_string(&path).expect("config written");
    assert!(written.contains("[consolidation]"), "{written}");
    assert!(written.contains("yield_interval"), "{written}");
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let path = config_path(&dir);
    fs::write(&path, "[consolidation\n").expect("write config");
    cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(&path)
        .args(["phonetic", "Mill Creek"])
        .assert()
        .failure();
}
