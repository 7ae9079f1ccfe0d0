/// USACE district hourly report pages.
///
/// The Little Rock District publishes per-project tabular reports as HTML
/// with the data in a single `<pre>` block, one row per hour:
///
/// ```text
///  DATE    TIME   ELEV    TAILWATER  GEN   OUTFLOW
///  10JUN2025 0800  554.12  367.40     0     2450
///  10JUN2025 0900  554.21  367.38     37    M
/// ```
///
/// Rows start with `DDMONYYYY HHMM` (hour `2400` is next-day midnight).
/// Columns are whitespace-separated and counted from 0 at the date, so the
/// first value column is 2. Missing cells (`M`, `--`, `-`, `N/A`) become
/// absent readings.

use chrono::FixedOffset;
use log::debug;
use reqwest::blocking::Client;

use crate::analysis::timestamps::parse_source_timestamp;
use crate::ingest::{get_text, FetchWindow, SourceAdapter};
use crate::model::{is_placeholder, IngestError, Metric, RawReading};

pub const LABEL: &str = "REPORT";

/// Parses the `<pre>` table of a report page.
///
/// # Errors
/// - `IngestError::ParseError` - the page has no `<pre>` block.
/// - `IngestError::NoDataAvailable` - no row carried a parseable timestamp.
pub fn parse_report(
    html: &str,
    columns: &[(Metric, usize)],
    offset: FixedOffset,
) -> Result<Vec<RawReading>, IngestError> {
    let table = extract_pre_block(html)
        .ok_or_else(|| IngestError::ParseError("report page has no <pre> block".to_string()))?;

    let mut readings = Vec::new();
    let mut rows = 0usize;

    for line in table.lines() {
        let cells: Vec<&str> = line.split_whitespace().collect();
        if cells.len() < 2 || !is_report_date(cells[0]) {
            continue;
        }
        let Some(observed_at) = parse_source_timestamp(&format!("{} {}", cells[0], cells[1]), offset) else {
            continue;
        };
        rows += 1;

        for (metric, idx) in columns {
            readings.push(RawReading {
                metric: *metric,
                observed_at,
                value: cells.get(*idx).and_then(|cell| parse_cell(cell)),
                source: LABEL.to_string(),
            });
        }
    }

    if rows == 0 {
        return Err(IngestError::NoDataAvailable("report table has no data rows".to_string()));
    }

    debug!("report: {} rows, {} readings", rows, readings.len());
    Ok(readings)
}

/// Text between the first `<pre ...>` and `</pre>`, case-insensitive.
fn extract_pre_block(html: &str) -> Option<&str> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<pre")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</pre>")?;
    Some(&html[start..end])
}

/// `DDMONYYYY`, e.g. `10JUN2025`.
fn is_report_date(cell: &str) -> bool {
    let b = cell.as_bytes();
    b.len() == 9
        && b[..2].iter().all(u8::is_ascii_digit)
        && b[2..5].iter().all(u8::is_ascii_alphabetic)
        && b[5..].iter().all(u8::is_ascii_digit)
}

fn parse_cell(cell: &str) -> Option<f64> {
    if is_placeholder(cell) {
        return None;
    }
    cell.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// One report page; the page covers whatever window the district prints.
pub struct ReportAdapter {
    client: Client,
    url: String,
    columns: Vec<(Metric, usize)>,
    offset: FixedOffset,
}

impl ReportAdapter {
    pub fn new(client: Client, url: &str, columns: Vec<(Metric, usize)>, offset: FixedOffset) -> Self {
        ReportAdapter {
            client,
            url: url.to_string(),
            columns,
            offset,
        }
    }
}

impl SourceAdapter for ReportAdapter {
    fn label(&self) -> &str {
        LABEL
    }

    fn describe(&self) -> String {
        format!("report {}", self.url)
    }

    fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawReading>, IngestError> {
        let body = get_text(&self.client, &self.url, "text/html")?;
        let readings = parse_report(&body, &self.columns, self.offset)?;

        Ok(readings
            .into_iter()
            .filter(|r| r.observed_at >= window.begin && r.observed_at <= window.end)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
