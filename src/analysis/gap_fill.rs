/// Per-metric series construction and gap filling.
///
/// Adapters hand back flat `RawReading`s. `group_by_metric` buckets them
/// into one sparse series per metric keyed by `CanonicalHour`; the fill
/// functions then densify each series over the union of hours seen for the
/// dam, so the assembler can look every metric up at every hour.
///
/// Two policies share the same mechanism:
/// - forward-fill carries the last known value into later empty hours;
/// - incremental-delta forward-fills a cumulative counter and differences
///   it, clamping resets to zero and giving the first reading a delta of 0.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};

use crate::analysis::timestamps::CanonicalHour;
use crate::model::{Metric, RawReading};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A reading that actually arrived for a given hour.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub value: f64,
    pub observed_at: DateTime<FixedOffset>,
    pub source: String,
}

/// One slot of a filled series. `observed` is `Some` only when a real
/// reading landed in this hour; carried-forward slots have `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledValue {
    pub value: f64,
    pub observed: Option<Observation>,
}

pub type MetricSeries = BTreeMap<CanonicalHour, Observation>;
pub type FilledSeries = BTreeMap<CanonicalHour, FilledValue>;

/// How missing hours of a metric are reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    ForwardFill,
    IncrementalDelta,
    /// Interval totals: a missing hour means nothing was reported.
    NoFill,
}

pub fn policy_for(metric: Metric) -> FillPolicy {
    match metric {
        Metric::CumulativePrecipitation => FillPolicy::IncrementalDelta,
        Metric::Rainfall => FillPolicy::NoFill,
        _ => FillPolicy::ForwardFill,
    }
}

// ---------------------------------------------------------------------------
// Series construction
// ---------------------------------------------------------------------------

/// Buckets readings into one sparse series per metric.
///
/// Readings without a finite value are dropped. When several readings of a
/// metric land in the same canonical hour, the latest instant wins.
pub fn group_by_metric(readings: &[RawReading], offset: FixedOffset) -> BTreeMap<Metric, MetricSeries> {
    let mut grouped: BTreeMap<Metric, MetricSeries> = BTreeMap::new();

    for reading in readings {
        let value = match reading.value {
            Some(v) if v.is_finite() => v,
            _ => continue,
        };

        let hour = CanonicalHour::from_instant(&reading.observed_at, offset);
        let series = grouped.entry(reading.metric).or_default();

        let replace = match series.get(&hour) {
            Some(existing) => reading.observed_at > existing.observed_at,
            None => true,
        };
        if replace {
            series.insert(
                hour,
                Observation {
                    value,
                    observed_at: reading.observed_at,
                    source: reading.source.clone(),
                },
            );
        }
    }

    grouped
}

/// Every hour observed by any metric of the dam.
pub fn timestamp_union<'a, I>(series: I) -> BTreeSet<CanonicalHour>
where
    I: IntoIterator<Item = &'a MetricSeries>,
{
    series
        .into_iter()
        .flat_map(|s| s.keys().copied())
        .collect()
}

// ---------------------------------------------------------------------------
// Filling
// ---------------------------------------------------------------------------

/// Fills a series according to the metric's policy.
pub fn fill(metric: Metric, series: &MetricSeries, union: &BTreeSet<CanonicalHour>) -> FilledSeries {
    match policy_for(metric) {
        FillPolicy::ForwardFill => forward_fill(series, union),
        FillPolicy::IncrementalDelta => incremental_delta(series, union),
        FillPolicy::NoFill => restrict(series, union),
    }
}

/// Carries the last known value forward over `union`, oldest to newest.
/// Hours before the first reading stay absent.
pub fn forward_fill(series: &MetricSeries, union: &BTreeSet<CanonicalHour>) -> FilledSeries {
    let mut filled = FilledSeries::new();
    let mut last: Option<f64> = None;

    for hour in union {
        match series.get(hour) {
            Some(obs) => {
                last = Some(obs.value);
                filled.insert(
                    *hour,
                    FilledValue {
                        value: obs.value,
                        observed: Some(obs.clone()),
                    },
                );
            }
            None => {
                if let Some(value) = last {
                    filled.insert(*hour, FilledValue { value, observed: None });
                }
            }
        }
    }

    filled
}

/// Turns a cumulative counter into per-hour increments.
///
/// The first available hour has no baseline and yields exactly 0, so rain
/// accumulated before the window is not attributed to that hour. Drops in
/// the counter (resets, noise) clamp to 0.
pub fn incremental_delta(series: &MetricSeries, union: &BTreeSet<CanonicalHour>) -> FilledSeries {
    let cumulative = forward_fill(series, union);
    let mut deltas = FilledSeries::new();
    let mut previous: Option<f64> = None;

    for (hour, slot) in cumulative {
        let delta = match previous {
            Some(p) => (slot.value - p).max(0.0),
            None => 0.0,
        };
        previous = Some(slot.value);
        deltas.insert(
            hour,
            FilledValue {
                value: delta,
                observed: slot.observed,
            },
        );
    }

    deltas
}

/// Keeps only real readings that fall inside `union`.
fn restrict(series: &MetricSeries, union: &BTreeSet<CanonicalHour>) -> FilledSeries {
    series
        .iter()
        .filter(|(hour, _)| union.contains(hour))
        .map(|(hour, obs)| {
            (
                *hour,
                FilledValue {
                    value: obs.value,
                    observed: Some(obs.clone()),
                },
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
