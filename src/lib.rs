/// damwatch_service: White River Basin reservoir telemetry collector.
///
/// # Module structure
///
/// ```text
/// damwatch_service
/// ├── model       - shared data types (Metric, RawReading, DamRecord, DamHistory, errors)
/// ├── config      - dam registry and collector settings (damwatch.toml)
/// ├── collector   - one run: parallel fetch, per-dam merge, snapshot publish
/// ├── ingest
/// │   ├── cwms      - USACE CWMS Data API timeseries
/// │   ├── usgs      - USGS NWIS IV API: URL construction + JSON parsing
/// │   ├── report    - USACE district hourly report pages
/// │   ├── lake_temp - lake conditions page temperature
/// │   └── fixtures (test only) - representative provider payloads
/// ├── analysis
/// │   ├── timestamps - provider timestamp parsing, CanonicalHour join key
/// │   ├── gap_fill   - per-metric series, forward-fill, incremental deltas
/// │   ├── storage    - storage curve and flow derivations
/// │   └── assemble   - filled series → newest-first DamRecords
/// └── history
///     ├── merge    - completeness-wins merge into a dam's history
///     ├── store    - JSON file persistence
///     └── snapshot - live.json rebuilding
/// ```

/// Public modules
pub mod analysis;
pub mod collector;
pub mod config;
pub mod history;
pub mod ingest;
pub mod model;
