/// Core data types for the White River Basin dam collector.
///
/// This module defines the shared domain model imported by all other modules:
/// the metrics we collect, the raw readings adapters hand back, the persisted
/// record and file shapes, and the error types. It contains no I/O.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A physical quantity reported by one of the source adapters.
///
/// The snake_case names are the keys used in `damwatch.toml` when mapping a
/// provider's series (CWMS timeseries id, USGS parameter code, report column)
/// onto a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Pool elevation, feet MSL.
    WaterLevel,
    /// Reservoir inflow, cfs.
    Inflow,
    /// Total release (powerhouse + spillway), cfs.
    TotalOutflow,
    /// Release through the turbines only, cfs.
    PowerhouseDischarge,
    /// Release through the spillway gates, cfs.
    SpillwayRelease,
    /// Hourly energy generated, MWh.
    PowerGeneration,
    /// Running precipitation counter, inches.
    CumulativePrecipitation,
    /// Precipitation already reported per interval, inches.
    Rainfall,
}

impl Metric {
    /// Order in which metrics are consulted when picking the source
    /// timestamp of an assembled record.
    pub const TIMESTAMP_PRIORITY: [Metric; 8] = [
        Metric::WaterLevel,
        Metric::TotalOutflow,
        Metric::Inflow,
        Metric::PowerhouseDischarge,
        Metric::SpillwayRelease,
        Metric::PowerGeneration,
        Metric::CumulativePrecipitation,
        Metric::Rainfall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::WaterLevel => "water_level",
            Metric::Inflow => "inflow",
            Metric::TotalOutflow => "total_outflow",
            Metric::PowerhouseDischarge => "powerhouse_discharge",
            Metric::SpillwayRelease => "spillway_release",
            Metric::PowerGeneration => "power_generation",
            Metric::CumulativePrecipitation => "cumulative_precipitation",
            Metric::Rainfall => "rainfall",
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "water_level" => Ok(Metric::WaterLevel),
            "inflow" => Ok(Metric::Inflow),
            "total_outflow" => Ok(Metric::TotalOutflow),
            "powerhouse_discharge" => Ok(Metric::PowerhouseDischarge),
            "spillway_release" => Ok(Metric::SpillwayRelease),
            "power_generation" => Ok(Metric::PowerGeneration),
            "cumulative_precipitation" => Ok(Metric::CumulativePrecipitation),
            "rainfall" => Ok(Metric::Rainfall),
            other => Err(format!("unknown metric '{}'", other)),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single value as returned by a source adapter, before normalization.
///
/// `observed_at` keeps the offset the provider reported in, so the
/// persisted `sourceTimestamp` stays faithful to the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub metric: Metric,
    pub observed_at: DateTime<FixedOffset>,
    pub value: Option<f64>,
    /// Adapter label, e.g. "CWMS" or "USGS".
    pub source: String,
}

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// Values that providers and older history files use to mean "no data".
/// Compared case-insensitively after trimming.
pub const PLACEHOLDER_VALUES: &[&str] = &["", "-", "--", "n/a", "na", "m", "null", "unavailable"];

/// True when `value` is one of the "no data" placeholders.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim().to_ascii_lowercase();
    PLACEHOLDER_VALUES.iter().any(|p| *p == trimmed)
}

/// True when a persisted field carries real information.
pub fn is_informative(value: Option<&str>) -> bool {
    value.is_some_and(|v| !is_placeholder(v))
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// One hour of telemetry for one dam, as persisted in the history files.
///
/// Every value is stored as a display string so that files written by older
/// collectors (which used strings throughout) keep round-tripping unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_house_discharge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spillway_release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_outflow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_generation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rainfall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turbine_efficiency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lake_temperature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic_timestamp: bool,
}

impl DamRecord {
    /// All value fields, in declaration order. Used for completeness
    /// comparisons; `syntheticTimestamp` is a marker, not a value.
    pub fn fields(&self) -> [Option<&str>; 16] {
        [
            self.date.as_deref(),
            self.time.as_deref(),
            self.water_level.as_deref(),
            self.live_storage.as_deref(),
            self.storage_percentage.as_deref(),
            self.inflow.as_deref(),
            self.power_house_discharge.as_deref(),
            self.spillway_release.as_deref(),
            self.total_outflow.as_deref(),
            self.power_generation.as_deref(),
            self.rainfall.as_deref(),
            self.net_flow.as_deref(),
            self.turbine_efficiency.as_deref(),
            self.lake_temperature.as_deref(),
            self.data_source.as_deref(),
            self.source_timestamp.as_deref(),
        ]
    }

    /// Parsed water level, if present and numeric.
    pub fn water_level_ft(&self) -> Option<f64> {
        self.water_level
            .as_deref()
            .filter(|v| !is_placeholder(v))
            .and_then(|v| v.trim().parse::<f64>().ok())
    }

    /// A record without a positive water level carries nothing worth keeping.
    pub fn is_valid(&self) -> bool {
        self.water_level_ft().is_some_and(|level| level > 0.0)
    }

    /// The source timestamp as an instant, for ordering and merge keys.
    pub fn source_instant(&self) -> Option<DateTime<Utc>> {
        self.source_timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ---------------------------------------------------------------------------
// Persisted files
// ---------------------------------------------------------------------------

/// Contents of one per-dam history file, and of one entry in `live.json`.
///
/// The header mirrors the dam's static configuration; `data` is ordered
/// newest source timestamp first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamHistory {
    pub id: String,
    pub name: String,
    #[serde(rename = "officialName")]
    pub official_name: String,
    #[serde(rename = "MWL")]
    pub mwl: f64,
    #[serde(rename = "FRL")]
    pub frl: f64,
    #[serde(rename = "liveStorageAtFRL")]
    pub live_storage_at_frl: f64,
    #[serde(rename = "ruleLevel")]
    pub rule_level: f64,
    #[serde(rename = "blueLevel")]
    pub blue_level: f64,
    #[serde(rename = "orangeLevel")]
    pub orange_level: f64,
    #[serde(rename = "redLevel")]
    pub red_level: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub data: Vec<DamRecord>,
}

/// The consolidated `live.json` view: newest record per dam.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
    #[serde(default)]
    pub dams: Vec<DamHistory>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or parsing data from a provider.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpError(u16),
    /// Transport-level failure (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The response body could not be understood.
    #[error("Parse error: {0}")]
    ParseError(String),
    /// The response was well formed but contained no usable values.
    #[error("No data available: {0}")]
    NoDataAvailable(String),
}

/// Errors reading or writing the persisted JSON files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("{path} is not valid JSON: {source}")]
    Corrupt { path: PathBuf, source: serde_json::Error },
    #[error("failed to serialize {path}: {source}")]
    Serialize { path: PathBuf, source: serde_json::Error },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
