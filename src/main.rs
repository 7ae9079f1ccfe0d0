//! White River dam telemetry collector - single run
//!
//! Meant to be started every 30-60 minutes by an external scheduler
//! (cron, systemd timer). Each run:
//! 1. Fetches recent readings from CWMS, USGS and district report pages
//! 2. Reconciles them into hourly records per dam
//! 3. Merges the records into the per-dam history files
//! 4. Republishes live.json
//!
//! Usage:
//!   damwatch_service
//!
//! Environment:
//!   DAMWATCH_CONFIG - configuration file (default: damwatch.toml)
//!   RUST_LOG        - log filter (default: info)
//!
//! Exit codes: 0 on completion (including partial per-dam failure),
//! 1 when nothing could be written, 2 on unexpected arguments.

use chrono::Utc;
use damwatch_service::collector;
use damwatch_service::config::load_config;
use damwatch_service::ingest::{build_client, sources_for};
use std::env;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 1 {
        eprintln!("Unknown argument: {}", args[1]);
        eprintln!("Usage: {}", args[0]);
        process::exit(2);
    }

    println!("🌊 White River Dam Collector");
    println!("============================\n");

    println!("📋 Loading configuration...");
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ {}\n", e);
            process::exit(1);
        }
    };
    println!("✓ {} dams configured\n", config.dams.len());

    let client = match build_client(config.collector.http_timeout_secs) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("\n❌ Could not build HTTP client: {}\n", e);
            process::exit(1);
        }
    };

    let sources = config
        .dams
        .iter()
        .map(|dam| sources_for(dam, &client, config.offset_for(dam)))
        .collect();

    println!("📥 Collecting...");
    let report = match collector::run(&config, sources, Utc::now()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("\n❌ {}\n", e);
            process::exit(1);
        }
    };

    println!("\n📊 Run summary");
    println!("   Updated:        {}", list_or_dash(&report.dams_updated));
    println!("   No data:        {}", list_or_dash(&report.dams_without_data));
    println!("   Failed:         {}", list_or_dash(&report.dams_failed));
    println!(
        "   Records:        {} new, {} upgraded",
        report.records_inserted, report.records_replaced
    );
    println!("   Adapter errors: {}", report.adapter_failures);
    if report.snapshot_written {
        println!("   ✓ {} published", config.collector.live_file.display());
    }
    for path in &report.failed_writes {
        eprintln!("   ✗ write failed: {}", path.display());
    }

    if report.all_writes_failed() {
        eprintln!("\n❌ Every write failed\n");
        process::exit(1);
    }
}

fn list_or_dash(ids: &[String]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.join(", ")
    }
}
