/// Timestamp normalization.
///
/// Every provider reports time differently: CWMS sends epoch milliseconds,
/// USGS sends ISO 8601 with an offset, the district report pages print
/// naive local times such as `10JUN2025 1500` (with `2400` for midnight).
/// This module turns all of them into an absolute instant, and buckets
/// instants into a `CanonicalHour` measured in the reservoir's fixed local
/// offset. The canonical hour is only a join key; the original instant is
/// kept alongside it for display and merging.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone};

/// Naive (offset-less) formats, interpreted in the reservoir's offset.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H%M",
    "%d%b%Y %H%M",
];

// ---------------------------------------------------------------------------
// Canonical hour
// ---------------------------------------------------------------------------

/// Hour-granular join key: whole hours since the Unix epoch, counted in
/// local clock time of a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalHour(i64);

impl CanonicalHour {
    /// Buckets an instant into the local clock hour it falls in.
    pub fn from_instant<Tz: TimeZone>(instant: &DateTime<Tz>, offset: FixedOffset) -> Self {
        let local_secs = instant.timestamp() + i64::from(offset.local_minus_utc());
        CanonicalHour(local_secs.div_euclid(3600))
    }

    pub fn hours_since_epoch(&self) -> i64 {
        self.0
    }

    /// Start of the hour, expressed in `offset`. Only used to synthesize a
    /// display timestamp when no source instant survived.
    pub fn start(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        let utc_secs = self.0 * 3600 - i64::from(offset.local_minus_utc());
        offset.timestamp_opt(utc_secs, 0).single()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses a provider timestamp into an absolute instant.
///
/// Strings carrying their own offset keep it. Naive strings are read in
/// `offset`. Bare integers are epoch milliseconds (13+ digits) or seconds.
/// Returns `None` for anything unparseable; callers drop the reading.
pub fn parse_source_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.len() >= 9 && raw.chars().all(|c| c.is_ascii_digit()) {
        let n: i64 = raw.parse().ok()?;
        return if raw.len() >= 13 {
            from_epoch_millis(n)
        } else {
            DateTime::from_timestamp(n, 0).map(|dt| dt.fixed_offset())
        };
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    let (raw, next_day) = rewrite_hour_24(raw);
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())?;
    let naive = if next_day { naive + Duration::days(1) } else { naive };

    offset.from_local_datetime(&naive).single()
}

/// Converts CWMS-style epoch milliseconds to a UTC instant.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.fixed_offset())
}

/// USACE reports write midnight as hour 24 of the previous day.
fn rewrite_hour_24(raw: &str) -> (String, bool) {
    for (suffix, replacement) in [
        (" 2400", " 0000"),
        (" 24:00", " 00:00"),
        (" 24:00:00", " 00:00:00"),
        ("T24:00:00", "T00:00:00"),
        ("T24:00", "T00:00"),
    ] {
        if let Some(stem) = raw.strip_suffix(suffix) {
            return (format!("{}{}", stem, replacement), true);
        }
    }
    (raw.to_string(), false)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Persisted form of a source instant: RFC 3339, seconds precision, `Z`
/// for UTC.
pub fn format_source_timestamp(instant: &DateTime<FixedOffset>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Local display date (`YYYY-MM-DD`) and time (`HH:MM`) of an instant.
pub fn display_date_time(instant: &DateTime<FixedOffset>, offset: FixedOffset) -> (String, String) {
    let local = instant.with_timezone(&offset);
    (local.format("%Y-%m-%d").to_string(), local.format("%H:%M").to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
