/// USGS NWIS Instantaneous Values (IV) API client.
///
/// Handles URL construction and JSON response parsing for the USGS Water
/// Services IV endpoint:
///   https://waterservices.usgs.gov/nwis/iv/
///
/// The IV service returns WaterML rendered as JSON. See `fixtures.rs` for
/// an annotated example of the response structure. Around the White River
/// projects it mostly supplies precipitation (`00045`) and tailwater flows.

use std::collections::BTreeMap;

use chrono::FixedOffset;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::analysis::timestamps::parse_source_timestamp;
use crate::ingest::{get_text, FetchWindow, SourceAdapter};
use crate::model::{IngestError, Metric, RawReading};

pub const LABEL: &str = "USGS";

// ---------------------------------------------------------------------------
// Serde structures for WaterML JSON deserialization
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IvResponse {
    value: ValueWrapper,
}

#[derive(Deserialize)]
struct ValueWrapper {
    #[serde(rename = "timeSeries")]
    time_series: Vec<TimeSeries>,
}

#[derive(Deserialize)]
struct TimeSeries {
    variable: Variable,
    values: Vec<Values>,
}

#[derive(Deserialize)]
struct Variable {
    #[serde(rename = "variableCode")]
    variable_code: Vec<VariableCode>,
    #[serde(rename = "noDataValue")]
    no_data_value: Option<f64>,
}

#[derive(Deserialize)]
struct VariableCode {
    value: String,
}

#[derive(Deserialize)]
struct Values {
    value: Vec<ValueEntry>,
}

#[derive(Deserialize)]
struct ValueEntry {
    value: String, // USGS returns as string!
    #[serde(rename = "dateTime")]
    date_time: String,
}

const DEFAULT_NO_DATA: f64 = -999999.0;

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

const IV_BASE_URL: &str = "https://waterservices.usgs.gov/nwis/iv/";

/// Builds a USGS IV API URL for the given site codes, parameter codes,
/// and ISO 8601 period (e.g. `"PT168H"` for the past week).
///
/// The returned URL always requests JSON format.
pub fn build_iv_url(sites: &[&str], param_codes: &[&str], period: &str) -> String {
    format!(
        "{}?sites={}&parameterCd={}&period={}&format=json",
        IV_BASE_URL,
        sites.join(","),
        param_codes.join(","),
        period
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses an IV response into readings, returning every value of every
/// `timeSeries` whose parameter code is mapped in `parameters`.
///
/// Values that fail to parse, match the series' `noDataValue`, or carry an
/// unparseable `dateTime` are skipped.
///
/// # Errors
/// - `IngestError::ParseError` - malformed or unexpected JSON structure.
/// - `IngestError::NoDataAvailable` - no usable value in any mapped series.
pub fn parse_iv_response(
    json: &str,
    parameters: &BTreeMap<String, Metric>,
    offset: FixedOffset,
) -> Result<Vec<RawReading>, IngestError> {
    let response: IvResponse = serde_json::from_str(json)
        .map_err(|e| IngestError::ParseError(format!("JSON deserialization failed: {}", e)))?;

    if response.value.time_series.is_empty() {
        return Err(IngestError::NoDataAvailable(
            "No timeSeries entries in response".to_string(),
        ));
    }

    let mut readings = Vec::new();

    for series in response.value.time_series {
        let parameter_code = series
            .variable
            .variable_code
            .first()
            .ok_or_else(|| IngestError::ParseError("Missing variableCode".to_string()))?
            .value
            .clone();

        let Some(metric) = parameters.get(&parameter_code).copied() else {
            debug!("USGS parameter {} not mapped, skipping", parameter_code);
            continue;
        };
        let no_data_value = series.variable.no_data_value.unwrap_or(DEFAULT_NO_DATA);

        for entry in series.values.iter().flat_map(|v| v.value.iter()) {
            let value: f64 = match entry.value.trim().parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if (value - no_data_value).abs() < 0.1 {
                continue;
            }
            let Some(observed_at) = parse_source_timestamp(&entry.date_time, offset) else {
                continue;
            };

            readings.push(RawReading {
                metric,
                observed_at,
                value: Some(value),
                source: LABEL.to_string(),
            });
        }
    }

    if readings.is_empty() {
        return Err(IngestError::NoDataAvailable(
            "All mapped timeSeries were empty or contained sentinel values".to_string(),
        ));
    }

    Ok(readings)
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// One USGS site, all configured parameters in a single request.
pub struct UsgsAdapter {
    client: Client,
    site_code: String,
    parameters: BTreeMap<String, Metric>,
    offset: FixedOffset,
}

impl UsgsAdapter {
    pub fn new(
        client: Client,
        site_code: &str,
        parameters: BTreeMap<String, Metric>,
        offset: FixedOffset,
    ) -> Self {
        UsgsAdapter {
            client,
            site_code: site_code.to_string(),
            parameters,
            offset,
        }
    }
}

impl SourceAdapter for UsgsAdapter {
    fn label(&self) -> &str {
        LABEL
    }

    fn describe(&self) -> String {
        format!("USGS site {}", self.site_code)
    }

    fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawReading>, IngestError> {
        let codes: Vec<&str> = self.parameters.keys().map(String::as_str).collect();
        let period = format!("PT{}H", window.hours());
        let url = build_iv_url(&[&self.site_code], &codes, &period);
        debug!("Fetching: {}", url);

        let body = get_text(&self.client, &url, "application/json")?;
        parse_iv_response(&body, &self.parameters, self.offset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
