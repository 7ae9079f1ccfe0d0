/// USACE CWMS Data API Client
///
/// Retrieves reservoir timeseries (pool elevation, releases, generation,
/// precipitation) from the Corps Water Management System for the Little
/// Rock District (office `SWL`) projects on the White River.
///
/// API Documentation: https://cwms-data.usace.army.mil/cwms-data/swagger-ui.html
/// Base URL: https://cwms-data.usace.army.mil/cwms-data/
///
/// Response values are `[epoch_ms, value | null, quality]` triples.

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::analysis::timestamps::from_epoch_millis;
use crate::ingest::{get_text, FetchWindow, SourceAdapter};
use crate::model::{IngestError, Metric, RawReading};

const CWMS_API_BASE: &str = "https://cwms-data.usace.army.mil/cwms-data";

pub const LABEL: &str = "CWMS";

// ============================================================================
// CWMS API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct CwmsTimeseriesResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    values: Option<Vec<(i64, Option<f64>, Option<i64>)>>,
}

// ============================================================================
// URL construction + parsing
// ============================================================================

/// Builds the timeseries request for `timeseries_id` over `[begin, end]`.
pub fn build_timeseries_url(
    timeseries_id: &str,
    office_id: &str,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    format!(
        "{}/timeseries?name={}&office={}&begin={}&end={}",
        CWMS_API_BASE,
        urlencoding::encode(timeseries_id),
        office_id,
        begin.format("%Y-%m-%dT%H:%M:%SZ"),
        end.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

/// Parses a timeseries response into readings of `metric`.
///
/// Null values are kept as absent readings; entries with an out-of-range
/// timestamp are dropped.
///
/// # Errors
/// - `IngestError::ParseError` - body is not a CWMS timeseries document.
/// - `IngestError::NoDataAvailable` - the `values` array is missing or empty.
pub fn parse_timeseries_response(json: &str, metric: Metric) -> Result<Vec<RawReading>, IngestError> {
    let response: CwmsTimeseriesResponse = serde_json::from_str(json)
        .map_err(|e| IngestError::ParseError(format!("CWMS JSON deserialization failed: {}", e)))?;

    let name = response.name.unwrap_or_else(|| "unnamed series".to_string());
    let values = match response.values {
        Some(values) if !values.is_empty() => values,
        _ => return Err(IngestError::NoDataAvailable(format!("{} returned no values", name))),
    };

    debug!(
        "{}: {} values ({})",
        name,
        values.len(),
        response.units.as_deref().unwrap_or("no units")
    );

    let readings = values
        .into_iter()
        .filter_map(|(millis, value, _quality)| {
            let observed_at = from_epoch_millis(millis)?;
            Some(RawReading {
                metric,
                observed_at,
                value,
                source: LABEL.to_string(),
            })
        })
        .collect();

    Ok(readings)
}

// ============================================================================
// Adapter
// ============================================================================

/// One configured CWMS series of a dam.
pub struct CwmsAdapter {
    client: Client,
    office: String,
    timeseries_id: String,
    metric: Metric,
}

impl CwmsAdapter {
    pub fn new(client: Client, office: &str, timeseries_id: &str, metric: Metric) -> Self {
        CwmsAdapter {
            client,
            office: office.to_string(),
            timeseries_id: timeseries_id.to_string(),
            metric,
        }
    }
}

impl SourceAdapter for CwmsAdapter {
    fn label(&self) -> &str {
        LABEL
    }

    fn describe(&self) -> String {
        format!("CWMS {} ({})", self.timeseries_id, self.metric)
    }

    fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawReading>, IngestError> {
        let url = build_timeseries_url(&self.timeseries_id, &self.office, window.begin, window.end);
        debug!("Fetching: {}", url);

        let body = get_text(&self.client, &url, "application/json")?;
        parse_timeseries_response(&body, self.metric)
    }
}

// ============================================================================
// Tests
// ============================================================================
