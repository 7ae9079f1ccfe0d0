/// Integration tests for a full collection run
///
/// These tests drive `collector::run` end to end with in-memory adapters
/// and a scratch directory, and check what lands on disk:
/// 1. First run creates history files and live.json
/// 2. A failing dam leaves its files byte-identical while others update
/// 3. Re-running with the same data changes nothing
/// 4. Total source failure and unusable files are reported, not fatal
///
/// Run with: cargo test --test collection_run

use chrono::{DateTime, FixedOffset, Utc};
use damwatch_service::collector::{self, RunReport};
use damwatch_service::config::Config;
use damwatch_service::ingest::{DamSources, FetchWindow, LakeTemperatureSource, SourceAdapter};
use damwatch_service::model::{DamHistory, IngestError, LiveSnapshot, Metric, RawReading};
use std::fs;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct FakeAdapter {
    label: &'static str,
    readings: Vec<RawReading>,
}

impl SourceAdapter for FakeAdapter {
    fn label(&self) -> &str {
        self.label
    }

    fn describe(&self) -> String {
        format!("fake {}", self.label)
    }

    fn fetch(&self, _window: &FetchWindow) -> Result<Vec<RawReading>, IngestError> {
        Ok(self.readings.clone())
    }
}

struct FailingAdapter;

impl SourceAdapter for FailingAdapter {
    fn label(&self) -> &str {
        "CWMS"
    }

    fn describe(&self) -> String {
        "failing CWMS".to_string()
    }

    fn fetch(&self, _window: &FetchWindow) -> Result<Vec<RawReading>, IngestError> {
        Err(IngestError::HttpError(503))
    }
}

struct FakeLake(Option<i32>);

impl LakeTemperatureSource for FakeLake {
    fn describe(&self) -> String {
        "fake lake".to_string()
    }

    fn fetch_temperature(&self) -> Result<Option<i32>, IngestError> {
        Ok(self.0)
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("damwatch-it-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn config_in(dir: &Path) -> Config {
    let toml = format!(
        r#"
        [collector]
        history_dir = '{history}'
        live_file = '{live}'
        workers = 4

        [[dam]]
        id = "beaver"
        name = "Beaver"
        official_name = "Beaver Dam"
        latitude = 36.4206
        longitude = -93.8474
        max_water_level = 1135.0
        full_pool_level = 1120.0
        flood_pool_level = 1130.0
        dead_storage_level = 1077.0
        rule_level = 1120.0
        watch_level = 1121.0
        action_level = 1125.0
        flood_level = 1130.0
        live_storage_at_frl = 925000.0
        surface_area_acres = 28220.0
        flood_pool_storage_af = 1952000.0

        [[dam]]
        id = "norfork"
        name = "Norfork"
        official_name = "Norfork Dam"
        latitude = 36.2486
        longitude = -92.2396
        max_water_level = 590.0
        full_pool_level = 552.0
        flood_pool_level = 580.0
        dead_storage_level = 380.0
        rule_level = 552.0
        watch_level = 556.0
        action_level = 570.0
        flood_level = 580.0
        live_storage_at_frl = 1251000.0
        surface_area_acres = 22000.0
        flood_pool_storage_af = 1983000.0
        "#,
        history = dir.join("history").display(),
        live = dir.join("live.json").display(),
    );
    Config::from_toml(&toml, Path::new("test.toml")).expect("test config should parse")
}

fn reading(metric: Metric, ts: &str, value: f64) -> RawReading {
    RawReading {
        metric,
        observed_at: DateTime::parse_from_rfc3339(ts).unwrap(),
        value: Some(value),
        source: "CWMS".to_string(),
    }
}

fn hourly(metric: Metric, hours: &[u32], values: &[f64]) -> Vec<RawReading> {
    hours
        .iter()
        .zip(values)
        .map(|(h, v)| reading(metric, &format!("2025-06-10T{:02}:00:00Z", h), *v))
        .collect()
}

fn working(readings: Vec<RawReading>, lake: Option<i32>) -> DamSources {
    DamSources {
        adapters: vec![Box::new(FakeAdapter { label: "CWMS", readings })],
        lake_temperature: Some(Box::new(FakeLake(lake))),
    }
}

fn failing() -> DamSources {
    DamSources {
        adapters: vec![Box::new(FailingAdapter), Box::new(FailingAdapter)],
        lake_temperature: None,
    }
}

fn beaver_readings(hours: &[u32]) -> Vec<RawReading> {
    let mut r = hourly(Metric::WaterLevel, hours, &[1121.40, 1121.42, 1121.45]);
    r.extend(hourly(Metric::TotalOutflow, hours, &[5200.0, 5100.0, 5000.0]));
    r
}

fn norfork_readings(hours: &[u32]) -> Vec<RawReading> {
    let mut r = hourly(Metric::WaterLevel, hours, &[554.12, 554.17, 554.21]);
    r.extend(hourly(Metric::TotalOutflow, hours, &[2449.0, 2449.0, 3100.0]));
    r.extend(hourly(Metric::Inflow, hours, &[1800.0, 1750.0, 1900.0]));
    r
}

fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
}

fn run(config: &Config, sources: Vec<DamSources>, now: &str) -> RunReport {
    collector::run(config, sources, at(now)).expect("run should complete")
}

fn load_history(dir: &Path, name: &str) -> DamHistory {
    let body = fs::read_to_string(dir.join("history").join(format!("{}.json", name))).unwrap();
    serde_json::from_str(&body).unwrap()
}

fn load_live(dir: &Path) -> LiveSnapshot {
    serde_json::from_str(&fs::read_to_string(dir.join("live.json")).unwrap()).unwrap()
}

fn timestamps(history: &DamHistory) -> Vec<String> {
    history
        .data
        .iter()
        .map(|r| r.source_timestamp.clone().unwrap_or_default())
        .collect()
}

// ---------------------------------------------------------------------------
// 1. First run
// ---------------------------------------------------------------------------

#[test]
fn test_first_run_creates_history_and_snapshot() {
    let dir = scratch_dir("first");
    let config = config_in(&dir);

    let report = run(
        &config,
        vec![
            working(beaver_readings(&[13, 14]), None),
            working(norfork_readings(&[13, 14]), Some(78)),
        ],
        "2025-06-10T16:05:00Z",
    );

    assert_eq!(report.dams_updated, vec!["beaver", "norfork"]);
    assert_eq!(report.records_inserted, 4);
    assert!(report.snapshot_written);
    assert!(!report.all_writes_failed());

    let norfork = load_history(&dir, "Norfork");
    assert_eq!(norfork.official_name, "Norfork Dam");
    assert_eq!(
        timestamps(&norfork),
        vec!["2025-06-10T14:00:00Z", "2025-06-10T13:00:00Z"],
        "history must be newest-first"
    );
    assert_eq!(norfork.data[0].lake_temperature.as_deref(), Some("78"));
    assert_eq!(norfork.data[1].lake_temperature.as_deref(), Some("0"));
    assert_eq!(norfork.data[0].net_flow.as_deref(), Some("-699"));

    let live = load_live(&dir);
    assert_eq!(live.last_update, "2025-06-10 10:05:00");
    let ids: Vec<&str> = live.dams.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["beaver", "norfork"]);
    assert!(live.dams.iter().all(|d| d.data.len() == 1));
    assert_eq!(live.dams[1].data[0].source_timestamp.as_deref(), Some("2025-06-10T14:00:00Z"));

    let _ = fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// 2. Partial failure
// ---------------------------------------------------------------------------

#[test]
fn test_failed_dam_is_untouched_while_others_update() {
    let dir = scratch_dir("partial");
    let config = config_in(&dir);

    run(
        &config,
        vec![
            working(beaver_readings(&[13, 14]), None),
            working(norfork_readings(&[13, 14]), None),
        ],
        "2025-06-10T15:05:00Z",
    );

    let beaver_path = dir.join("history").join("Beaver.json");
    let beaver_before = fs::read(&beaver_path).unwrap();
    let beaver_entry_before = serde_json::to_string(&load_live(&dir).dams[0]).unwrap();

    let report = run(
        &config,
        vec![failing(), working(norfork_readings(&[13, 14, 15]), None)],
        "2025-06-10T16:05:00Z",
    );

    assert_eq!(report.dams_without_data, vec!["beaver"]);
    assert_eq!(report.dams_updated, vec!["norfork"]);
    assert_eq!(report.adapter_failures, 2);

    assert_eq!(fs::read(&beaver_path).unwrap(), beaver_before, "Beaver history must be byte-identical");

    let live = load_live(&dir);
    assert_eq!(
        serde_json::to_string(&live.dams[0]).unwrap(),
        beaver_entry_before,
        "Beaver snapshot entry must be unchanged"
    );
    assert_eq!(live.dams[1].data[0].source_timestamp.as_deref(), Some("2025-06-10T15:00:00Z"));
    assert_eq!(load_history(&dir, "Norfork").data.len(), 3);

    let _ = fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// 3. Idempotence
// ---------------------------------------------------------------------------

#[test]
fn test_rerun_with_same_data_rewrites_nothing() {
    let dir = scratch_dir("rerun");
    let config = config_in(&dir);
    let sources = || {
        vec![
            working(beaver_readings(&[13, 14]), None),
            working(norfork_readings(&[13, 14]), None),
        ]
    };

    run(&config, sources(), "2025-06-10T15:05:00Z");
    let norfork_path = dir.join("history").join("Norfork.json");
    let before = fs::read(&norfork_path).unwrap();

    let report = run(&config, sources(), "2025-06-10T15:35:00Z");
    assert_eq!(report.records_inserted, 0);
    assert_eq!(report.records_replaced, 0);
    assert_eq!(fs::read(&norfork_path).unwrap(), before);
    assert_eq!(load_live(&dir).last_update, "2025-06-10 09:35:00");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_more_complete_rerun_upgrades_record_in_place() {
    let dir = scratch_dir("upgrade");
    let config = config_in(&dir);

    run(
        &config,
        vec![failing(), working(hourly(Metric::WaterLevel, &[15], &[554.21]), None)],
        "2025-06-10T15:30:00Z",
    );

    let mut richer = hourly(Metric::WaterLevel, &[15], &[554.21]);
    richer.extend(hourly(Metric::PowerGeneration, &[15], &[37.0]));
    richer.extend(hourly(Metric::TotalOutflow, &[15], &[2449.0]));
    let report = run(&config, vec![failing(), working(richer, None)], "2025-06-10T16:00:00Z");

    assert_eq!(report.records_replaced, 1);
    let norfork = load_history(&dir, "Norfork");
    assert_eq!(norfork.data.len(), 1);
    assert_eq!(norfork.data[0].power_generation.as_deref(), Some("37"));

    let _ = fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// 4. Failures
// ---------------------------------------------------------------------------

#[test]
fn test_total_source_failure_writes_nothing() {
    let dir = scratch_dir("outage");
    let config = config_in(&dir);

    let report = run(&config, vec![failing(), failing()], "2025-06-10T16:05:00Z");

    assert_eq!(report.dams_without_data, vec!["beaver", "norfork"]);
    assert_eq!(report.attempted_writes, 0);
    assert!(!report.all_writes_failed(), "nothing attempted is not a write failure");
    assert!(!dir.join("live.json").exists(), "live.json must not be created");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_corrupt_history_is_reported_and_left_alone() {
    let dir = scratch_dir("corrupt");
    let config = config_in(&dir);
    fs::create_dir_all(dir.join("history")).unwrap();
    let beaver_path = dir.join("history").join("Beaver.json");
    fs::write(&beaver_path, "{ truncated").unwrap();

    let report = run(
        &config,
        vec![
            working(beaver_readings(&[13, 14]), None),
            working(norfork_readings(&[13, 14]), None),
        ],
        "2025-06-10T16:05:00Z",
    );

    assert_eq!(report.dams_failed, vec!["beaver"]);
    assert_eq!(report.dams_updated, vec!["norfork"]);
    assert_eq!(fs::read_to_string(&beaver_path).unwrap(), "{ truncated");

    let ids: Vec<String> = load_live(&dir).dams.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["norfork"]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_uncreatable_history_dir_is_fatal() {
    let dir = scratch_dir("blocked");
    fs::write(dir.join("history"), "not a directory").unwrap();
    let config = config_in(&dir);

    let result = collector::run(&config, vec![failing(), failing()], at("2025-06-10T16:05:00Z"));
    assert!(result.is_err(), "history dir under a file cannot be created");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_dam_offset_does_not_split_hours() {
    // Readings in two offsets for the same local hour collapse to one record.
    let dir = scratch_dir("offsets");
    let config = config_in(&dir);
    let cdt = FixedOffset::west_opt(5 * 3600).unwrap();

    let mut readings = hourly(Metric::WaterLevel, &[15], &[554.21]);
    readings.push(RawReading {
        metric: Metric::Inflow,
        observed_at: DateTime::parse_from_rfc3339("2025-06-10T15:20:00Z").unwrap().with_timezone(&cdt),
        value: Some(1800.0),
        source: "USGS".to_string(),
    });

    run(&config, vec![failing(), working(readings, None)], "2025-06-10T16:05:00Z");

    let norfork = load_history(&dir, "Norfork");
    assert_eq!(norfork.data.len(), 1);
    assert_eq!(norfork.data[0].data_source.as_deref(), Some("CWMS+USGS"));
    assert_eq!(norfork.data[0].inflow.as_deref(), Some("1800"));

    let _ = fs::remove_dir_all(&dir);
}
