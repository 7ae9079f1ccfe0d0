/// Test fixtures: representative provider payloads and dam specs.
///
/// The payloads are structurally complete but truncated to the minimum
/// needed to exercise the parsers.
///
/// CWMS timeseries shape (`/cwms-data/timeseries`):
///   name, office-id, units
///   values[] - `[epoch_ms, value | null, quality]`
///
/// USGS IV response shape:
///   response.value.timeSeries[]
///     .variable.variableCode[0].value - parameter code (string)
///     .variable.noDataValue          - sentinel for missing data (-999999)
///     .values[0].value[]
///       .value     - the measurement as a STRING (not a number)
///       .dateTime  - ISO 8601 with offset
///
/// Note: measurement values are always JSON strings in the USGS response,
/// even though they represent numbers.

#[cfg(test)]
use std::collections::BTreeMap;

#[cfg(test)]
use crate::config::{
    CwmsSourceConfig, DamSpec, LakeTemperatureConfig, ReportSourceConfig, UsgsSourceConfig,
};
#[cfg(test)]
use crate::model::Metric;

/// Norfork pool elevation, hourly, 13:00Z–16:00Z on 2025-06-10. The 15:00Z
/// value is null (gauge dropout).
#[cfg(test)]
pub(crate) fn fixture_cwms_elevation_json() -> &'static str {
    r#"{
      "name": "Norfork_Dam-Headwater.Elev.Inst.1Hour.0.Ccp-Rev",
      "office-id": "SWL",
      "units": "ft",
      "value-columns": [
        { "name": "date-time", "ordinal": 1, "datatype": "java.sql.Timestamp" },
        { "name": "value", "ordinal": 2, "datatype": "java.lang.Double" },
        { "name": "quality-code", "ordinal": 3, "datatype": "int" }
      ],
      "values": [
        [1749560400000, 554.12, 0],
        [1749564000000, 554.17, 0],
        [1749567600000, null, 5],
        [1749571200000, 554.25, 0]
      ]
    }"#
}

/// A series with no values in the requested window.
#[cfg(test)]
pub(crate) fn fixture_cwms_empty_json() -> &'static str {
    r#"{
      "name": "Norfork_Dam.Flow-In.Ave.1Hour.1Hour.Ccp-Rev",
      "office-id": "SWL",
      "units": "cfs",
      "values": []
    }"#
}

/// Norfork tailwater gauge: rainfall (00045) with one sentinel value, and
/// discharge (00060).
#[cfg(test)]
pub(crate) fn fixture_usgs_rainfall_json() -> &'static str {
    r#"{
      "value": {
        "timeSeries": [
          {
            "sourceInfo": {
              "siteName": "North Fork River below Norfork Dam, AR",
              "siteCode": [{ "value": "07059998", "network": "NWIS", "agencyCode": "USGS" }]
            },
            "variable": {
              "variableCode": [{ "value": "00045", "network": "NWIS" }],
              "unit": { "unitCode": "in" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "0.00", "qualifiers": ["P"], "dateTime": "2025-06-10T09:00:00.000-05:00" },
                { "value": "-999999", "qualifiers": ["P", "Eqp"], "dateTime": "2025-06-10T09:30:00.000-05:00" },
                { "value": "0.12", "qualifiers": ["P"], "dateTime": "2025-06-10T10:00:00.000-05:00" }
              ]
            }]
          },
          {
            "sourceInfo": {
              "siteName": "North Fork River below Norfork Dam, AR",
              "siteCode": [{ "value": "07059998", "network": "NWIS", "agencyCode": "USGS" }]
            },
            "variable": {
              "variableCode": [{ "value": "00060", "network": "NWIS" }],
              "unit": { "unitCode": "ft3/s" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "2449", "qualifiers": ["P"], "dateTime": "2025-06-10T10:00:00.000-05:00" }
              ]
            }]
          }
        ]
      }
    }"#
}

/// Site with no active series.
#[cfg(test)]
pub(crate) fn fixture_usgs_empty_json() -> &'static str {
    r#"{ "value": { "timeSeries": [] } }"#
}

/// District hourly report page. Columns: date, time, elevation, tailwater,
/// generation, outflow. Includes missing cells and a 2400 row.
#[cfg(test)]
pub(crate) fn fixture_report_html() -> &'static str {
    r#"<html>
<head><title>NORFORK DAM - HOURLY REPORT</title></head>
<body>
<h1>Norfork Dam</h1>
<PRE class="report">
                     NORFORK DAM HOURLY DATA
  DATE     TIME    ELEV     TAILWATER   GEN(MWH)   OUTFLOW(CFS)
 10JUN2025 0800   554.12    367.40       0          2,450
 10JUN2025 0900   554.21    367.38       37         M
 10JUN2025 1000   554.25    367.35       41         --
 10JUN2025 2400   554.30    367.30       N/A        3100
</PRE>
</body>
</html>"#
}

#[cfg(test)]
pub(crate) fn fixture_lake_conditions_html() -> &'static str {
    r#"<html><body>
<h2>Lake Norfork Conditions</h2>
<table>
  <tr><td>Lake Level</td><td>554.21 ft</td></tr>
  <tr><td>Water Temp</td><td>78&deg;F</td></tr>
</table>
</body></html>"#
}

/// Norfork Dam as configured in `damwatch.toml`, with every source kind.
#[cfg(test)]
pub(crate) fn fixture_norfork_spec() -> DamSpec {
    DamSpec {
        id: "norfork".to_string(),
        name: "Norfork".to_string(),
        official_name: "Norfork Dam".to_string(),
        latitude: 36.2486,
        longitude: -92.2396,
        max_water_level: 590.0,
        full_pool_level: 552.0,
        flood_pool_level: 580.0,
        dead_storage_level: 380.0,
        rule_level: 552.0,
        watch_level: 556.0,
        action_level: 570.0,
        flood_level: 580.0,
        live_storage_at_frl: 1_251_000.0,
        surface_area_acres: 22_000.0,
        flood_pool_storage_af: 1_983_000.0,
        storage_exponent: 2.2,
        surcharge_percent: 15.0,
        utc_offset_minutes: None,
        cwms: Some(CwmsSourceConfig {
            office: "SWL".to_string(),
            timeseries: BTreeMap::from([
                (
                    "water_level".to_string(),
                    "Norfork_Dam-Headwater.Elev.Inst.1Hour.0.Ccp-Rev".to_string(),
                ),
                (
                    "total_outflow".to_string(),
                    "Norfork_Dam.Flow-Out.Ave.1Hour.1Hour.Ccp-Rev".to_string(),
                ),
            ]),
        }),
        usgs: Some(UsgsSourceConfig {
            site_code: "07059998".to_string(),
            parameters: BTreeMap::from([("00045".to_string(), Metric::Rainfall)]),
        }),
        report: Some(ReportSourceConfig {
            url: "https://www.swl-wc.usace.army.mil/pages/data/tabular/htm/norfork.htm".to_string(),
            columns: BTreeMap::from([
                ("water_level".to_string(), 2),
                ("power_generation".to_string(), 4),
                ("total_outflow".to_string(), 5),
            ]),
        }),
        lake_temperature: Some(LakeTemperatureConfig {
            url: "https://www.swl-wc.usace.army.mil/pages/data/lakes/norfork.htm".to_string(),
            marker: "Water Temp".to_string(),
        }),
    }
}
