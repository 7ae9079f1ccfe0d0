/// Source adapters: one per provider series configured for a dam.
///
/// Every adapter turns one provider response into flat `RawReading`s over a
/// `FetchWindow`. Parsing is kept in free functions taking the response
/// body, so each provider's format is tested against fixtures without a
/// network.
///
/// - `cwms`      - USACE CWMS Data API timeseries (JSON).
/// - `usgs`      - USGS NWIS Instantaneous Values (WaterML JSON).
/// - `report`    - USACE district hourly report pages (`<pre>` table).
/// - `lake_temp` - lake conditions page, best-effort water temperature.
/// - `fixtures`  (test only) - representative provider payloads.

pub mod cwms;
pub mod fixtures;
pub mod lake_temp;
pub mod report;
pub mod usgs;

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use reqwest::blocking::Client;

use crate::config::DamSpec;
use crate::model::{IngestError, RawReading};

const USER_AGENT: &str = concat!("damwatch_service/", env!("CARGO_PKG_VERSION"));

/// Time range requested from every provider in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// The `days` before `end`.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> Self {
        FetchWindow {
            begin: end - chrono::Duration::days(days),
            end,
        }
    }

    pub fn hours(&self) -> i64 {
        (self.end - self.begin).num_hours().max(1)
    }
}

/// A fetchable provider series for one dam.
pub trait SourceAdapter: Send + Sync {
    /// Short provider label written into `dataSource`, e.g. "CWMS".
    fn label(&self) -> &str;

    /// Human-readable description for logs.
    fn describe(&self) -> String;

    fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawReading>, IngestError>;
}

/// Best-effort lake water temperature, °F.
pub trait LakeTemperatureSource: Send + Sync {
    fn describe(&self) -> String;

    fn fetch_temperature(&self) -> Result<Option<i32>, IngestError>;
}

/// Everything to fetch for one dam in a run.
pub struct DamSources {
    pub adapters: Vec<Box<dyn SourceAdapter>>,
    pub lake_temperature: Option<Box<dyn LakeTemperatureSource>>,
}

/// Shared blocking client for all adapters.
pub fn build_client(timeout_secs: u64) -> Result<Client, IngestError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Instantiates the adapters configured for `dam`.
pub fn sources_for(dam: &DamSpec, client: &Client, offset: FixedOffset) -> DamSources {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();

    if let Some(cwms_cfg) = &dam.cwms {
        for (metric, ts_id) in cwms_cfg.series() {
            adapters.push(Box::new(cwms::CwmsAdapter::new(
                client.clone(),
                &cwms_cfg.office,
                &ts_id,
                metric,
            )));
        }
    }

    if let Some(usgs_cfg) = &dam.usgs {
        adapters.push(Box::new(usgs::UsgsAdapter::new(
            client.clone(),
            &usgs_cfg.site_code,
            usgs_cfg.parameters.clone(),
            offset,
        )));
    }

    if let Some(report_cfg) = &dam.report {
        adapters.push(Box::new(report::ReportAdapter::new(
            client.clone(),
            &report_cfg.url,
            report_cfg.column_map(),
            offset,
        )));
    }

    let lake_temperature = dam.lake_temperature.as_ref().map(|cfg| {
        Box::new(lake_temp::LakeTemperatureAdapter::new(client.clone(), &cfg.url, &cfg.marker))
            as Box<dyn LakeTemperatureSource>
    });

    DamSources {
        adapters,
        lake_temperature,
    }
}

/// GETs `url` and returns the body, mapping non-2xx statuses to
/// `IngestError::HttpError`.
pub(crate) fn get_text(client: &Client, url: &str, accept: &str) -> Result<String, IngestError> {
    let response = client.get(url).header("Accept", accept).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::HttpError(status.as_u16()));
    }

    Ok(response.text()?)
}
