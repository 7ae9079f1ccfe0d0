/// Record assembly.
///
/// Joins the filled per-metric series of one dam into `DamRecord`s, one per
/// canonical hour, newest first. Hours without a positive water level are
/// skipped: the level is the one metric whose absence voids a record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, Utc};
use log::debug;

use crate::analysis::gap_fill::{self, FilledSeries};
use crate::analysis::storage::{self, FlowInputs};
use crate::analysis::timestamps::{self, CanonicalHour};
use crate::config::DamSpec;
use crate::model::{DamRecord, Metric, RawReading};

/// Sentinel stored when no lake temperature is available.
pub const NO_LAKE_TEMPERATURE: &str = "0";

/// Where a record's `sourceTimestamp` came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceInstant {
    /// A real reading landed in this hour for the given metric.
    Observed(Metric, DateTime<FixedOffset>),
    /// Nothing survived; rebuilt from the canonical hour.
    Synthetic(DateTime<FixedOffset>),
}

/// Builds the ordered record list for one dam from this run's readings.
///
/// `lake_temperature_f` is the run's best-effort reading; it is attached to
/// the newest record only, older ones carry [`NO_LAKE_TEMPERATURE`].
pub fn assemble_records(
    dam: &DamSpec,
    offset: FixedOffset,
    readings: &[RawReading],
    lake_temperature_f: Option<i32>,
) -> Vec<DamRecord> {
    let grouped = gap_fill::group_by_metric(readings, offset);
    let union = gap_fill::timestamp_union(grouped.values());

    let filled: BTreeMap<Metric, FilledSeries> = grouped
        .iter()
        .map(|(metric, series)| (*metric, gap_fill::fill(*metric, series, &union)))
        .collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for hour in union.iter().rev() {
        let level = match value_at(&filled, Metric::WaterLevel, hour) {
            Some(level) if level > 0.0 => level,
            _ => {
                skipped += 1;
                continue;
            }
        };
        records.push(build_record(dam, offset, &filled, *hour, level));
    }

    if skipped > 0 {
        debug!("{}: skipped {} hours without a water level", dam.name, skipped);
    }

    for (i, record) in records.iter_mut().enumerate() {
        record.lake_temperature = Some(match (i, lake_temperature_f) {
            (0, Some(temp)) => temp.to_string(),
            _ => NO_LAKE_TEMPERATURE.to_string(),
        });
    }

    records
}

fn build_record(
    dam: &DamSpec,
    offset: FixedOffset,
    filled: &BTreeMap<Metric, FilledSeries>,
    hour: CanonicalHour,
    level: f64,
) -> DamRecord {
    let flows = storage::derive_flows(&FlowInputs {
        inflow_cfs: value_at(filled, Metric::Inflow, &hour),
        total_outflow_cfs: value_at(filled, Metric::TotalOutflow, &hour),
        powerhouse_cfs: value_at(filled, Metric::PowerhouseDischarge, &hour),
        spillway_cfs: value_at(filled, Metric::SpillwayRelease, &hour),
        generation_mwh: value_at(filled, Metric::PowerGeneration, &hour),
    });

    // Cumulative-counter deltas win over provider interval totals.
    let rainfall = value_at(filled, Metric::CumulativePrecipitation, &hour)
        .or_else(|| value_at(filled, Metric::Rainfall, &hour));

    let (instant, synthetic) = match source_instant(filled, hour, offset) {
        SourceInstant::Observed(_, at) => (at, false),
        SourceInstant::Synthetic(at) => (at, true),
    };
    let (date, time) = timestamps::display_date_time(&instant, offset);

    DamRecord {
        date: Some(date),
        time: Some(time),
        water_level: Some(fixed(level, 2)),
        live_storage: Some(fixed(storage::live_storage_af(level, dam), 0)),
        storage_percentage: Some(fixed(storage::storage_percentage(level, dam), 2)),
        inflow: value_at(filled, Metric::Inflow, &hour).map(|v| fixed(v, 0)),
        power_house_discharge: flows.turbine_cfs.map(|v| fixed(v, 0)),
        spillway_release: value_at(filled, Metric::SpillwayRelease, &hour).map(|v| fixed(v, 0)),
        total_outflow: flows.total_outflow_cfs.map(|v| fixed(v, 0)),
        power_generation: value_at(filled, Metric::PowerGeneration, &hour).map(|v| fixed(v, 0)),
        rainfall: rainfall.map(|v| fixed(v, 2)),
        net_flow: flows.net_flow_cfs.map(|v| fixed(v, 0)),
        turbine_efficiency: flows.turbine_efficiency.map(|v| fixed(v, 4)),
        lake_temperature: None,
        data_source: data_source_label(filled, &hour),
        source_timestamp: Some(timestamps::format_source_timestamp(&instant)),
        synthetic_timestamp: synthetic,
    }
}

/// Picks the instant of the first metric, in priority order, that was
/// actually observed in this hour; otherwise synthesizes the hour start.
pub fn source_instant(
    filled: &BTreeMap<Metric, FilledSeries>,
    hour: CanonicalHour,
    offset: FixedOffset,
) -> SourceInstant {
    for metric in Metric::TIMESTAMP_PRIORITY {
        let observed = filled
            .get(&metric)
            .and_then(|series| series.get(&hour))
            .and_then(|slot| slot.observed.as_ref());
        if let Some(obs) = observed {
            return SourceInstant::Observed(metric, obs.observed_at);
        }
    }

    let start = hour
        .start(offset)
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.with_timezone(&offset));
    SourceInstant::Synthetic(start)
}

fn value_at(filled: &BTreeMap<Metric, FilledSeries>, metric: Metric, hour: &CanonicalHour) -> Option<f64> {
    filled.get(&metric).and_then(|s| s.get(hour)).map(|slot| slot.value)
}

/// `+`-joined labels of the adapters that reported in this hour.
fn data_source_label(filled: &BTreeMap<Metric, FilledSeries>, hour: &CanonicalHour) -> Option<String> {
    let sources: BTreeSet<&str> = filled
        .values()
        .filter_map(|series| series.get(hour))
        .filter_map(|slot| slot.observed.as_ref())
        .map(|obs| obs.source.as_str())
        .collect();

    if sources.is_empty() {
        None
    } else {
        Some(sources.into_iter().collect::<Vec<_>>().join("+"))
    }
}

/// Fixed-decimal display string without a stray "-0".
fn fixed(value: f64, decimals: usize) -> String {
    let s = format!("{:.*}", decimals, value);
    match s.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => s,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
