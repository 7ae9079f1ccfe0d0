/// Collector configuration loader - parses damwatch.toml
///
/// Separates dam metadata, storage-curve calibration and provider endpoints
/// from code, making it easy to adjust thresholds, add dams, or repoint a
/// source without recompiling the collector.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

use crate::model::{DamHistory, Metric};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "damwatch.toml";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "DAMWATCH_CONFIG";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Collector settings
// ---------------------------------------------------------------------------

/// Run-wide settings from the `[collector]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Folder holding one `<name>.json` history file per dam.
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    /// Consolidated snapshot file.
    #[serde(default = "default_live_file")]
    pub live_file: PathBuf,

    /// How far back each adapter asks its provider for data.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Reference offset for canonical hours, unless a dam overrides it.
    /// White River Basin projects operate on Central Standard Time.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Worker threads used for adapter fetches.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request HTTP timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("history")
}

fn default_live_file() -> PathBuf {
    PathBuf::from("live.json")
}

fn default_lookback_days() -> i64 {
    7
}

fn default_utc_offset_minutes() -> i32 {
    -360
}

fn default_workers() -> usize {
    8
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            live_file: default_live_file(),
            lookback_days: default_lookback_days(),
            utc_offset_minutes: default_utc_offset_minutes(),
            workers: default_workers(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dam specification
// ---------------------------------------------------------------------------

/// Static description of one monitored dam, one `[[dam]]` table each.
///
/// Elevations are feet above the project datum, volumes acre-feet.
#[derive(Debug, Clone, Deserialize)]
pub struct DamSpec {
    pub id: String,
    pub name: String,
    pub official_name: String,

    pub latitude: f64,
    pub longitude: f64,

    // Characteristic elevations
    pub max_water_level: f64,
    pub full_pool_level: f64,
    pub flood_pool_level: f64,
    pub dead_storage_level: f64,
    pub rule_level: f64,

    // Alert thresholds (blue / orange / red in the published files)
    pub watch_level: f64,
    pub action_level: f64,
    pub flood_level: f64,

    pub live_storage_at_frl: f64,
    pub surface_area_acres: f64,

    // Storage-curve calibration. Hand-fitted per project; see DESIGN.md.
    pub flood_pool_storage_af: f64,
    #[serde(default = "default_storage_exponent")]
    pub storage_exponent: f64,
    #[serde(default = "default_surcharge_percent")]
    pub surcharge_percent: f64,

    /// Overrides `collector.utc_offset_minutes` for this dam.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,

    // Providers
    #[serde(default)]
    pub cwms: Option<CwmsSourceConfig>,
    #[serde(default)]
    pub usgs: Option<UsgsSourceConfig>,
    #[serde(default)]
    pub report: Option<ReportSourceConfig>,
    #[serde(default)]
    pub lake_temperature: Option<LakeTemperatureConfig>,
}

fn default_storage_exponent() -> f64 {
    2.2
}

fn default_surcharge_percent() -> f64 {
    15.0
}

/// USACE CWMS Data API series for a dam: metric name → timeseries id.
#[derive(Debug, Clone, Deserialize)]
pub struct CwmsSourceConfig {
    pub office: String,
    pub timeseries: BTreeMap<String, String>,
}

/// USGS NWIS IV gauge for a dam: parameter code → metric.
#[derive(Debug, Clone, Deserialize)]
pub struct UsgsSourceConfig {
    pub site_code: String,
    pub parameters: BTreeMap<String, Metric>,
}

/// USACE district tabular report page: metric name → column index.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSourceConfig {
    pub url: String,
    pub columns: BTreeMap<String, usize>,
}

/// Lake conditions page carrying a water temperature.
#[derive(Debug, Clone, Deserialize)]
pub struct LakeTemperatureConfig {
    pub url: String,
    pub marker: String,
}

impl CwmsSourceConfig {
    /// Configured series as typed (metric, timeseries id) pairs.
    /// Keys are checked by `Config::validate`, so unknown ones are skipped.
    pub fn series(&self) -> Vec<(Metric, String)> {
        self.timeseries
            .iter()
            .filter_map(|(key, ts_id)| key.parse::<Metric>().ok().map(|m| (m, ts_id.clone())))
            .collect()
    }
}

impl ReportSourceConfig {
    pub fn column_map(&self) -> Vec<(Metric, usize)> {
        self.columns
            .iter()
            .filter_map(|(key, idx)| key.parse::<Metric>().ok().map(|m| (m, *idx)))
            .collect()
    }
}

impl DamSpec {
    /// Fixed offset this dam's canonical hours are measured in.
    pub fn offset(&self, default_minutes: i32) -> FixedOffset {
        let minutes = self.utc_offset_minutes.unwrap_or(default_minutes);
        // Range is checked in `Config::validate`.
        FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

/// Builds the header written at the top of a dam's history file and its
/// `live.json` entry. `data` starts empty.
impl From<&DamSpec> for DamHistory {
    fn from(spec: &DamSpec) -> Self {
        DamHistory {
            id: spec.id.clone(),
            name: spec.name.clone(),
            official_name: spec.official_name.clone(),
            mwl: spec.max_water_level,
            frl: spec.full_pool_level,
            live_storage_at_frl: spec.live_storage_at_frl,
            rule_level: spec.rule_level,
            blue_level: spec.watch_level,
            orange_level: spec.action_level,
            red_level: spec.flood_level,
            latitude: spec.latitude,
            longitude: spec.longitude,
            data: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Root configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(rename = "dam", default)]
    pub dams: Vec<DamSpec>,
}

impl Config {
    /// Parses and validates a configuration document.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reference offset for a dam.
    pub fn offset_for(&self, dam: &DamSpec) -> FixedOffset {
        dam.offset(self.collector.utc_offset_minutes)
    }

    /// Run-wide reference offset, used for `lastUpdate`.
    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.collector.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dams.is_empty() {
            return Err(ConfigError::Invalid("no [[dam]] entries configured".to_string()));
        }
        if self.collector.workers == 0 {
            return Err(ConfigError::Invalid("collector.workers must be at least 1".to_string()));
        }
        if self.collector.lookback_days <= 0 {
            return Err(ConfigError::Invalid("collector.lookback_days must be positive".to_string()));
        }
        check_offset("collector", self.collector.utc_offset_minutes)?;

        let mut seen = HashSet::new();
        for dam in &self.dams {
            if dam.id.trim().is_empty() || dam.name.trim().is_empty() {
                return Err(ConfigError::Invalid("dam id and name must not be empty".to_string()));
            }
            if !seen.insert(dam.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate dam id '{}'", dam.id)));
            }
            validate_dam(dam)?;
        }
        Ok(())
    }
}

fn check_offset(owner: &str, minutes: i32) -> Result<(), ConfigError> {
    if minutes.abs() > 14 * 60 {
        return Err(ConfigError::Invalid(format!(
            "{}: utc_offset_minutes {} is out of range",
            owner, minutes
        )));
    }
    Ok(())
}

fn validate_dam(dam: &DamSpec) -> Result<(), ConfigError> {
    let invalid = |msg: &str| ConfigError::Invalid(format!("{}: {}", dam.id, msg));

    if dam.dead_storage_level >= dam.flood_pool_level {
        return Err(invalid("dead_storage_level must be below flood_pool_level"));
    }
    if dam.flood_pool_level > dam.max_water_level {
        return Err(invalid("flood_pool_level must not exceed max_water_level"));
    }
    if dam.storage_exponent <= 0.0 {
        return Err(invalid("storage_exponent must be positive"));
    }
    if dam.surcharge_percent < 0.0 {
        return Err(invalid("surcharge_percent must not be negative"));
    }
    if dam.live_storage_at_frl <= 0.0 || dam.surface_area_acres <= 0.0 {
        return Err(invalid("live_storage_at_frl and surface_area_acres must be positive"));
    }
    if dam.flood_pool_storage_af <= 0.0 {
        return Err(invalid("flood_pool_storage_af must be positive"));
    }
    if !(dam.watch_level <= dam.action_level && dam.action_level <= dam.flood_level) {
        return Err(invalid("alert levels must ascend: watch <= action <= flood"));
    }
    if let Some(minutes) = dam.utc_offset_minutes {
        check_offset(&dam.id, minutes)?;
    }

    if let Some(cwms) = &dam.cwms {
        for key in cwms.timeseries.keys() {
            key.parse::<Metric>().map_err(|e| invalid(&format!("cwms.timeseries: {}", e)))?;
        }
    }
    if let Some(report) = &dam.report {
        for key in report.columns.keys() {
            key.parse::<Metric>().map_err(|e| invalid(&format!("report.columns: {}", e)))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads the configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml(&contents, path)
}

/// Loads the configuration named by `DAMWATCH_CONFIG` (a `.env` file is
/// honoured), falling back to `damwatch.toml` in the working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenv::dotenv().ok();

    let path = env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_config_from(&path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
