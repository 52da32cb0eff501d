#![allow(missing_docs)]

use assert_cmd::cargo::cargo_bin_cmd;
use locality_consolidator::{
    Consolidation, ConsolidationOptions, Coordinates, Dataset, ExclusionRecord, LocalityId,
    LocalityRecord, Region, RegionId, RegionRank,
};
use serde_json::Value;
use tempfile::TempDir;
use time::macros::datetime;

fn record(id: u32, region: u32, name: &str, at: Option<(f64, f64)>) -> LocalityRecord {
    LocalityRecord {
        locality_id: LocalityId(id),
        region_id: RegionId(region),
        latitude: at.map(|(lat, _)| lat),
        longitude: at.map(|(_, lon)| lon),
        name: name.to_string(),
        remarks: Some("collected along the trail".to_string()),
        last_modified: datetime!(2022-08-14 13:45 UTC),
    }
}

fn sample() -> Dataset {
    Dataset {
        regions: vec![
            Region::new(10, RegionRank::State, "Texas"),
            Region::new(1, RegionRank::County, "Travis").with_parent(10),
            Region::new(2, RegionRank::County, "Hays").with_parent(10),
        ],
        adjacency: vec![(RegionId(1), RegionId(2))],
        localities: vec![
            record(1, 1, "Pedernales Falls", Some((30.30, -98.25))),
            record(2, 1, "Pedernales Falls", Some((30.31, -98.26))),
            record(3, 1, "Bee Cave", None),
            record(4, 2, "Beecave Road", None),
            record(5, 2, "Hamilton Pool", None),
        ],
        synonyms: vec![("Bee Cave".to_string(), "Beecave".to_string())],
        exclusions: vec![ExclusionRecord::Coordinates {
            word_series: "Pedernales Falls".to_string(),
            coordinates: (
                Coordinates::new(30.31, -98.26),
                Coordinates::new(30.30, -98.25),
            ),
        }],
        domain: vec![RegionId(10)],
    }
}

#[test]
fn saved_dataset_round_trips_and_runs() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("texas.json");
    let dataset = sample();
    dataset.save(&path).expect("save");

    let loaded = Dataset::load(&path).expect("load");
    assert_eq!(loaded, dataset);

    let ctx = loaded
        .into_context(ConsolidationOptions::new(), &[])
        .expect("context");
    let mut run = Consolidation::new(ctx);
    let mut found = Vec::new();
    let summary = run.run_to_end(|m| found.push(m)).expect("run");

    let pairs: Vec<(u32, u32)> = found
        .iter()
        .map(|m| (m.base.locality_id.0, m.test.locality_id.0))
        .collect();
    assert_eq!(pairs, vec![(3, 4)]);
    assert!(found[0].phonetic_matches.iter().any(|m| m.synonymous));
    assert_eq!(summary.matches_suppressed, 1);
    assert_eq!(summary.localities_evicted, 5);
}

#[test]
fn cli_runs_a_saved_dataset() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("texas.json");
    sample().save(&path).expect("save");

    let output = cargo_bin_cmd!("consolidator")
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["--format", "json", "run", "--domain", "1"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    let matches = json["matches"].as_array().expect("matches array");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["base"]["name"].as_str(), Some("Bee Cave"));
    assert_eq!(json["summary"]["matches_suppressed"].as_u64(), Some(1));
}
