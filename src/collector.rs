/// One collection run, start to finish.
///
/// 1. Every adapter of every dam is queued on one worker pool; results come
///    back over a channel tagged with the dam's index.
/// 2. Per dam, on this thread: assemble records, load the history file,
///    merge, and write it back only if it changed.
/// 3. After all dams, `live.json` is rebuilt once from the dams that
///    produced records.
///
/// A dam whose adapters all fail, or whose history file cannot be read,
/// is skipped and reported; it never stops the others.

use std::path::PathBuf;
use std::sync::mpsc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use threadpool::ThreadPool;

use crate::analysis::assemble::assemble_records;
use crate::config::{Config, DamSpec};
use crate::history::merge::{merge_records, MergeOutcome};
use crate::history::{snapshot, store};
use crate::ingest::{DamSources, FetchWindow};
use crate::model::{DamHistory, IngestError, RawReading, StoreError};

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// What happened to each dam and file during a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Dams that produced records and whose history is current on disk.
    pub dams_updated: Vec<String>,
    /// Dams for which no adapter returned a usable reading.
    pub dams_without_data: Vec<String>,
    /// Dams skipped because their history file could not be used.
    pub dams_failed: Vec<String>,
    pub records_inserted: usize,
    pub records_replaced: usize,
    pub adapter_failures: usize,
    pub attempted_writes: usize,
    pub failed_writes: Vec<PathBuf>,
    pub snapshot_written: bool,
}

impl RunReport {
    /// True when at least one write was attempted and none succeeded.
    pub fn all_writes_failed(&self) -> bool {
        self.attempted_writes > 0 && self.failed_writes.len() == self.attempted_writes
    }

    fn record_merge(&mut self, outcome: &MergeOutcome) {
        self.records_inserted += outcome.inserted;
        self.records_replaced += outcome.replaced;
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Everything the adapters of one dam returned.
#[derive(Debug, Default)]
struct DamFetch {
    readings: Vec<RawReading>,
    lake_temperature: Option<i32>,
    failures: usize,
}

enum FetchMessage {
    Readings {
        dam: usize,
        source: String,
        result: Result<Vec<RawReading>, IngestError>,
    },
    Temperature {
        dam: usize,
        source: String,
        result: Result<Option<i32>, IngestError>,
    },
}

/// Runs every adapter on a pool of `workers` threads and groups the results
/// per dam, in the order of `sources`.
fn fetch_all(sources: Vec<DamSources>, window: FetchWindow, workers: usize) -> Vec<DamFetch> {
    let pool = ThreadPool::new(workers.max(1));
    let (tx, rx) = mpsc::channel();
    let mut fetched: Vec<DamFetch> = sources.iter().map(|_| DamFetch::default()).collect();

    for (dam, dam_sources) in sources.into_iter().enumerate() {
        for adapter in dam_sources.adapters {
            let tx = tx.clone();
            pool.execute(move || {
                let source = adapter.describe();
                let result = adapter.fetch(&window);
                let _ = tx.send(FetchMessage::Readings { dam, source, result });
            });
        }
        if let Some(lake) = dam_sources.lake_temperature {
            let tx = tx.clone();
            pool.execute(move || {
                let source = lake.describe();
                let result = lake.fetch_temperature();
                let _ = tx.send(FetchMessage::Temperature { dam, source, result });
            });
        }
    }
    // The receiver loop ends once every job has dropped its sender.
    drop(tx);

    for message in rx {
        match message {
            FetchMessage::Readings { dam, source, result } => match result {
                Ok(readings) => {
                    debug!("{}: {} readings", source, readings.len());
                    fetched[dam].readings.extend(readings);
                }
                Err(e) => {
                    warn!("{} unavailable: {}", source, e);
                    fetched[dam].failures += 1;
                }
            },
            FetchMessage::Temperature { dam, source, result } => match result {
                Ok(temp) => fetched[dam].lake_temperature = temp,
                Err(e) => warn!("{} unavailable: {}", source, e),
            },
        }
    }

    pool.join();
    fetched
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Executes one run over `config.dams`, with `sources[i]` feeding
/// `config.dams[i]`.
///
/// # Errors
/// Only when the history folder cannot be created; every other failure is
/// recorded in the returned report.
pub fn run(config: &Config, sources: Vec<DamSources>, now: DateTime<Utc>) -> Result<RunReport, StoreError> {
    let history_dir = &config.collector.history_dir;
    store::ensure_dir(history_dir)?;

    let window = FetchWindow::trailing_days(now, config.collector.lookback_days);
    info!(
        "Fetching {} dams from {} to {}",
        config.dams.len(),
        window.begin.format("%Y-%m-%d %H:%M"),
        window.end.format("%Y-%m-%d %H:%M")
    );

    let fetched = fetch_all(sources, window, config.collector.workers);

    let mut report = RunReport::default();
    let mut refreshed: Vec<DamHistory> = Vec::new();

    for (idx, dam) in config.dams.iter().enumerate() {
        let fetch = fetched.get(idx);
        report.adapter_failures += fetch.map_or(0, |f| f.failures);

        let readings = fetch.map(|f| f.readings.as_slice()).unwrap_or(&[]);
        let lake_temperature = fetch.and_then(|f| f.lake_temperature);

        if let Some(history) = process_dam(config, dam, readings, lake_temperature, &mut report) {
            refreshed.push(history);
        }
    }

    if refreshed.is_empty() {
        info!("No dam produced records; leaving {} untouched", config.collector.live_file.display());
    } else {
        publish_snapshot(config, &refreshed, now, &mut report);
    }

    Ok(report)
}

/// Reconciles and persists one dam. Returns the merged history when the
/// dam produced records and its file on disk is current.
fn process_dam(
    config: &Config,
    dam: &DamSpec,
    readings: &[RawReading],
    lake_temperature: Option<i32>,
    report: &mut RunReport,
) -> Option<DamHistory> {
    let offset = config.offset_for(dam);
    let records = assemble_records(dam, offset, readings, lake_temperature);

    if records.is_empty() {
        warn!("{}: no usable records this run", dam.name);
        report.dams_without_data.push(dam.id.clone());
        return None;
    }

    let path = store::history_path(&config.collector.history_dir, &dam.name);
    let mut history = match store::load_history(&path) {
        Ok(Some(history)) => history,
        Ok(None) => {
            info!("{}: starting new history at {}", dam.name, path.display());
            DamHistory::from(dam)
        }
        Err(e) => {
            error!("{}: {}; history left untouched", dam.name, e);
            report.dams_failed.push(dam.id.clone());
            return None;
        }
    };

    let outcome = merge_records(&mut history, &records, dam);
    report.record_merge(&outcome);

    if outcome.changed() {
        report.attempted_writes += 1;
        if let Err(e) = store::save_history(&path, &history) {
            error!("{}: {}", dam.name, e);
            report.failed_writes.push(path);
            report.dams_failed.push(dam.id.clone());
            return None;
        }
    }

    info!(
        "{}: {} new, {} upgraded, {} unchanged",
        dam.name, outcome.inserted, outcome.replaced, outcome.unchanged
    );
    report.dams_updated.push(dam.id.clone());

    (!history.data.is_empty()).then_some(history)
}

fn publish_snapshot(config: &Config, refreshed: &[DamHistory], now: DateTime<Utc>, report: &mut RunReport) {
    let path = &config.collector.live_file;
    report.attempted_writes += 1;

    let previous = match store::load_snapshot(path) {
        Ok(previous) => previous,
        Err(e) => {
            error!("{}; not overwriting it", e);
            report.failed_writes.push(path.clone());
            return;
        }
    };

    let order: Vec<String> = config.dams.iter().map(|d| d.id.clone()).collect();
    let next = snapshot::publish(previous, refreshed, &order, now.with_timezone(&config.reference_offset()));

    match store::save_snapshot(path, &next) {
        Ok(()) => {
            report.snapshot_written = true;
            info!("Published {} dams to {}", next.dams.len(), path.display());
        }
        Err(e) => {
            error!("{}", e);
            report.failed_writes.push(path.clone());
        }
    }
}
