/// History merging.
///
/// A dam's history is an append-only, newest-first list of records keyed by
/// source instant. Merging a batch of freshly assembled records walks a
/// three-way decision per record:
///
/// - no record with the same instant → insert at its ordered position;
/// - a record exists and the new one carries strictly more informative
///   fields → replace it in place;
/// - otherwise → leave the stored record alone.
///
/// Because equal completeness never replaces, re-merging the same batch is a
/// no-op.

use log::debug;

use crate::analysis::assemble::NO_LAKE_TEMPERATURE;
use crate::config::DamSpec;
use crate::model::{is_informative, DamHistory, DamRecord};

/// Counts of what a merge did to a history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    /// Records rejected before merge (no water level, or no usable instant).
    pub dropped: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

/// Number of fields holding real data: present, non-empty, not a placeholder.
///
/// Zero is real data everywhere except `lakeTemperature`, where
/// [`NO_LAKE_TEMPERATURE`] means the page was not read.
pub fn informative_field_count(record: &DamRecord) -> usize {
    let count = record.fields().iter().filter(|f| is_informative(**f)).count();
    let temperature = record.lake_temperature.as_deref().map(str::trim);
    if temperature == Some(NO_LAKE_TEMPERATURE) {
        count.saturating_sub(1)
    } else {
        count
    }
}

/// True when `candidate` carries strictly more information than `existing`.
pub fn is_more_complete(candidate: &DamRecord, existing: &DamRecord) -> bool {
    informative_field_count(candidate) > informative_field_count(existing)
}

/// Merges `incoming` into `history`, keeping it newest-first.
///
/// When anything changed, the header is refreshed from `dam` so that edits to
/// the static configuration reach the file on the next productive run.
pub fn merge_records(history: &mut DamHistory, incoming: &[DamRecord], dam: &DamSpec) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    // Parsed once per merge; kept parallel to `history.data`.
    let mut keys: Vec<_> = history.data.iter().map(DamRecord::source_instant).collect();

    for record in incoming {
        let instant = match record.source_instant() {
            Some(instant) if record.is_valid() => instant,
            _ => {
                outcome.dropped += 1;
                continue;
            }
        };

        match keys.iter().position(|k| *k == Some(instant)) {
            Some(idx) => {
                if is_more_complete(record, &history.data[idx]) {
                    history.data[idx] = record.clone();
                    outcome.replaced += 1;
                } else {
                    outcome.unchanged += 1;
                }
            }
            None => {
                // Records without a parseable instant sort as oldest.
                let idx = keys.iter().position(|k| *k < Some(instant)).unwrap_or(keys.len());
                keys.insert(idx, Some(instant));
                history.data.insert(idx, record.clone());
                outcome.inserted += 1;
            }
        }
    }

    if outcome.changed() {
        refresh_header(history, dam);
    }

    debug!(
        "{}: merge inserted={} replaced={} unchanged={} dropped={}",
        dam.id, outcome.inserted, outcome.replaced, outcome.unchanged, outcome.dropped
    );

    outcome
}

fn refresh_header(history: &mut DamHistory, dam: &DamSpec) {
    let data = std::mem::take(&mut history.data);
    *history = DamHistory::from(dam);
    history.data = data;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::fixture_norfork_spec;

    fn record(ts: &str, level: &str) -> DamRecord {
        DamRecord {
            date: Some("2025-06-10".to_string()),
            time: Some("09:00".to_string()),
            water_level: Some(level.to_string()),
            source_timestamp: Some(ts.to_string()),
            ..Default::default()
        }
    }

    fn empty_history() -> DamHistory {
        DamHistory::from(&fixture_norfork_spec())
    }

    fn timestamps(history: &DamHistory) -> Vec<&str> {
        history
            .data
            .iter()
            .map(|r| r.source_timestamp.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn test_informative_field_count_ignores_placeholders_but_counts_zero() {
        let r = DamRecord {
            water_level: Some("554.21".to_string()),
            rainfall: Some("0.00".to_string()),
            inflow: Some("N/A".to_string()),
            spillway_release: Some("--".to_string()),
            power_generation: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(informative_field_count(&r), 2);
    }

    #[test]
    fn test_missing_lake_temperature_is_not_informative() {
        let mut r = record("2025-06-10T15:00:00Z", "554.21");
        r.lake_temperature = Some(NO_LAKE_TEMPERATURE.to_string());
        let without = informative_field_count(&r);

        r.lake_temperature = Some("78".to_string());
        assert_eq!(informative_field_count(&r), without + 1);

        r.lake_temperature = None;
        assert_eq!(informative_field_count(&r), without);
    }

    #[test]
    fn test_lake_temperature_arrival_replaces_existing_record() {
        let dam = fixture_norfork_spec();
        let mut history = empty_history();

        let mut first = record("2025-06-10T15:00:00Z", "554.21");
        first.lake_temperature = Some(NO_LAKE_TEMPERATURE.to_string());
        merge_records(&mut history, &[first.clone()], &dam);

        let mut second = first.clone();
        second.lake_temperature = Some("78".to_string());
        let outcome = merge_records(&mut history, &[second], &dam);
        assert_eq!(outcome.replaced, 1);
        assert_eq!(history.data[0].lake_temperature.as_deref(), Some("78"));

        // A later run that lost the lake page again does not undo it.
        let outcome = merge_records(&mut history, &[first], &dam);
        assert_eq!(outcome.replaced, 0);
        assert_eq!(history.data[0].lake_temperature.as_deref(), Some("78"));
    }

    #[test]
    fn test_insertion_after_record_without_instant() {
        let dam = fixture_norfork_spec();
        let mut history = empty_history();
        history.data = vec![
            record("2025-06-10T15:00:00Z", "554.21"),
            record("legacy", "554.00"),
        ];

        let outcome = merge_records(
            &mut history,
            &[
                record("2025-06-10T13:00:00Z", "554.10"),
                record("2025-06-10T14:00:00Z", "554.15"),
                record("2025-06-10T14:00:00+00:00", "554.15"),
            ],
            &dam,
        );

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(
            timestamps(&history),
            vec![
                "2025-06-10T15:00:00Z",
                "2025-06-10T14:00:00Z",
                "2025-06-10T13:00:00Z",
                "legacy",
            ]
        );
    }

    #[test]
    fn test_more_complete_replaces_less_complete_does_not() {
        let base = |n: usize| {
            let mut r = DamRecord::default();
            let values = ["554.21", "1200", "2449", "0", "37", "0.12", "-1249"];
            let slots: [&mut Option<String>; 7] = [
                &mut r.water_level,
                &mut r.inflow,
                &mut r.total_outflow,
                &mut r.spillway_release,
                &mut r.power_generation,
                &mut r.rainfall,
                &mut r.net_flow,
            ];
            for (slot, value) in slots.into_iter().zip(values).take(n) {
                *slot = Some(value.to_string());
            }
            r
        };

        assert!(is_more_complete(&base(7), &base(5)), "7 informative fields beat 5");
        assert!(!is_more_complete(&base(4), &base(5)), "4 informative fields never beat 5");
        assert!(!is_more_complete(&base(5), &base(5)), "equal completeness is not an upgrade");
    }

    #[test]
    fn test_new_records_are_inserted_newest_first() {
        let dam = fixture_norfork_spec();
        let mut history = empty_history();

        merge_records(&mut history, &[record("2025-06-10T15:00:00Z", "554.21")], &dam);
        let outcome = merge_records(
            &mut history,
            &[
                record("2025-06-10T17:00:00Z", "554.30"),
                record("2025-06-10T13:00:00Z", "554.10"),
                record("2025-06-10T16:00:00Z", "554.25"),
            ],
            &dam,
        );

        assert_eq!(outcome.inserted, 3);
        assert_eq!(
            timestamps(&history),
            vec![
                "2025-06-10T17:00:00Z",
                "2025-06-10T16:00:00Z",
                "2025-06-10T15:00:00Z",
                "2025-06-10T13:00:00Z",
            ]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dam = fixture_norfork_spec();
        let batch = vec![
            record("2025-06-10T16:00:00Z", "554.25"),
            record("2025-06-10T15:00:00Z", "554.21"),
        ];
        let mut history = empty_history();
        merge_records(&mut history, &batch, &dam);
        let once = history.clone();

        let outcome = merge_records(&mut history, &batch, &dam);
        assert!(!outcome.changed());
        assert_eq!(outcome.unchanged, 2);
        assert_eq!(history, once, "second merge must not alter history");
    }

    #[test]
    fn test_same_instant_in_another_offset_is_the_same_key() {
        let dam = fixture_norfork_spec();
        let mut history = empty_history();
        merge_records(&mut history, &[record("2025-06-10T15:00:00Z", "554.21")], &dam);

        let outcome = merge_records(&mut history, &[record("2025-06-10T10:00:00-05:00", "554.21")], &dam);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(history.data.len(), 1, "no duplicate for an equivalent instant");
    }

    #[test]
    fn test_rainfall_and_generation_upgrade_replaces_existing_record() {
        let dam = fixture_norfork_spec();
        let mut history = empty_history();

        let mut first = record("2025-06-10T15:00:00Z", "554.21");
        first.rainfall = Some("0.00".to_string());
        merge_records(&mut history, &[first], &dam);

        let mut second = record("2025-06-10T15:00:00Z", "554.21");
        second.rainfall = Some("0.12".to_string());
        second.power_generation = Some("37".to_string());
        let outcome = merge_records(&mut history, &[second], &dam);

        assert_eq!(outcome.replaced, 1);
        assert_eq!(history.data.len(), 1);
        assert_eq!(history.data[0].rainfall.as_deref(), Some("0.12"));
        assert_eq!(history.data[0].power_generation.as_deref(), Some("37"));
    }

    #[test]
    fn test_invalid_records_are_dropped_before_merge() {
        let dam = fixture_norfork_spec();
        let mut history = empty_history();
        let outcome = merge_records(
            &mut history,
            &[
                record("2025-06-10T15:00:00Z", "0.00"),
                record("2025-06-10T16:00:00Z", "M"),
                record("not-a-time", "554.21"),
            ],
            &dam,
        );
        assert_eq!(outcome.dropped, 3);
        assert!(history.data.is_empty());
    }

    #[test]
    fn test_header_refreshed_only_when_records_change() {
        let mut dam = fixture_norfork_spec();
        let mut history = empty_history();
        merge_records(&mut history, &[record("2025-06-10T15:00:00Z", "554.21")], &dam);

        dam.official_name = "Norfork Dam and Lake".to_string();
        merge_records(&mut history, &[record("2025-06-10T15:00:00Z", "554.21")], &dam);
        assert_eq!(history.official_name, "Norfork Dam", "no-op merge leaves header alone");

        merge_records(&mut history, &[record("2025-06-10T16:00:00Z", "554.25")], &dam);
        assert_eq!(history.official_name, "Norfork Dam and Lake");
        assert_eq!(history.data.len(), 2);
    }
}
