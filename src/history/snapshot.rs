/// `live.json` publishing.
///
/// The snapshot holds one entry per dam: the history header plus the newest
/// record. It is rebuilt once per run from the previous snapshot and the
/// histories of the dams refreshed in this run; every other entry is carried
/// over as it was.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};

use crate::model::{DamHistory, LiveSnapshot};

/// Format of `lastUpdate`.
pub const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Snapshot entry for a merged history: its header and newest record.
/// `None` when the history holds no records.
pub fn snapshot_entry(history: &DamHistory) -> Option<DamHistory> {
    let newest = history.data.first()?.clone();
    let mut entry = history.clone();
    entry.data = vec![newest];
    Some(entry)
}

/// Builds the next snapshot.
///
/// `refreshed` are the merged histories of dams that produced records this
/// run. Entries follow `config_order` (dam ids); entries of dams that are
/// no longer configured keep their previous relative order after those.
/// Duplicate ids in `previous` collapse to their first entry.
pub fn publish(
    previous: LiveSnapshot,
    refreshed: &[DamHistory],
    config_order: &[String],
    now: DateTime<FixedOffset>,
) -> LiveSnapshot {
    let mut remaining = previous.dams;
    let mut dams = Vec::with_capacity(config_order.len().max(remaining.len()));

    for id in config_order {
        let (matching, rest): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|e| &e.id == id);
        remaining = rest;
        let old = matching.into_iter().next();

        let fresh = refreshed
            .iter()
            .find(|h| &h.id == id)
            .and_then(snapshot_entry);

        if let Some(entry) = fresh.or(old) {
            dams.push(entry);
        }
    }
    let mut seen: HashSet<String> = HashSet::new();
    dams.extend(remaining.into_iter().filter(|e| seen.insert(e.id.clone())));

    LiveSnapshot {
        last_update: now.format(LAST_UPDATE_FORMAT).to_string(),
        dams,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
