/// Lake water temperature scraped from a lake conditions page.
///
/// The reading is best-effort: any failure, or a value outside the
/// plausible range, yields no temperature and the record falls back to the
/// `0` sentinel.

use log::debug;
use reqwest::blocking::Client;

use crate::ingest::{get_text, LakeTemperatureSource};
use crate::model::IngestError;

/// Plausible surface water temperatures, °F.
pub const PLAUSIBLE_RANGE_F: std::ops::RangeInclusive<i32> = 32..=110;

/// Finds the first number after `marker` in the visible text of `html`,
/// rounded to a whole degree.
pub fn parse_lake_temperature(html: &str, marker: &str) -> Option<i32> {
    let text = strip_tags(html);
    let lower = text.to_ascii_lowercase();
    let start = lower.find(&marker.to_ascii_lowercase())? + marker.len();

    let rest = &text[start..];
    let digits_at = rest.find(|c: char| c.is_ascii_digit())?;
    let number: String = rest[digits_at..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let value = number.trim_end_matches('.').parse::<f64>().ok()?.round() as i32;
    PLAUSIBLE_RANGE_F.contains(&value).then_some(value)
}

/// Drops everything between `<` and `>`, replacing each tag with a space.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

pub struct LakeTemperatureAdapter {
    client: Client,
    url: String,
    marker: String,
}

impl LakeTemperatureAdapter {
    pub fn new(client: Client, url: &str, marker: &str) -> Self {
        LakeTemperatureAdapter {
            client,
            url: url.to_string(),
            marker: marker.to_string(),
        }
    }
}

impl LakeTemperatureSource for LakeTemperatureAdapter {
    fn describe(&self) -> String {
        format!("lake temperature {}", self.url)
    }

    fn fetch_temperature(&self) -> Result<Option<i32>, IngestError> {
        let body = get_text(&self.client, &self.url, "text/html")?;
        let temp = parse_lake_temperature(&body, &self.marker);
        if temp.is_none() {
            debug!("no plausible '{}' reading on {}", self.marker, self.url);
        }
        Ok(temp)
    }
}
