//! wattmon - headless power monitoring daemon
//!
//! Drives the sampling loop and prints a live status line; a GUI would poll
//! the same `Monitor` surface instead.

use anyhow::Context;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wattmon::catalog::Catalog;
use wattmon::core::{Config, Method};
use wattmon::history::HistoryStore;
use wattmon::monitor::Monitor;
use wattmon::telemetry;

fn data_path() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not determine data directory")?;
    let app_dir = data_dir.join("wattmon");
    std::fs::create_dir_all(&app_dir)?;
    Ok(app_dir.join("history.db"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting wattmon v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let store = HistoryStore::open(data_path()?, config.sampling.first_tick_elapsed_secs)
        .context("Failed to open history store")?;
    match store.prune_older_than(config.history.retention_days) {
        Ok(0) => {}
        Ok(n) => log::info!("Pruned {} history records past retention", n),
        Err(e) => log::warn!("History pruning failed: {}", e),
    }

    let catalog = Catalog::detect();
    for component in catalog.components() {
        log::info!(
            "  {} [{}]: {} ({} W TDP)",
            component.id,
            component.kind.as_str(),
            component.name,
            catalog.lookup_tdp(component)
        );
    }

    let selected = telemetry::select_source(&catalog);
    let degraded = selected.degraded;

    let monitor = Arc::new(Monitor::new(
        selected.source,
        catalog,
        store,
        &config,
        degraded,
    ));

    let interval = Duration::from_secs(config.sampling.interval_secs);
    tokio::spawn(Arc::clone(&monitor).run(interval));

    if monitor.is_degraded() {
        println!("(estimation-only mode: no direct power sensor found)");
    }
    println!("Source: {}", monitor.source_name());
    println!("Rate:   {:.4} {}/kWh", monitor.cost_rate(), config.pricing.currency_symbol);
    println!();

    let mut status = tokio::time::interval(interval);
    loop {
        status.tick().await;

        let Some(reading) = monitor.current_reading() else {
            print!("\rwaiting for first reading...");
            io::stdout().flush()?;
            continue;
        };

        let direct_count = reading
            .readings
            .iter()
            .filter(|r| r.method == Method::Direct)
            .count();
        let projection = monitor.projected_cost().await?;

        print!(
            "\r{:>7.1} W total ({}/{} direct) | est. {:.4} {}/day, {:.2} {}/month   ",
            reading.total_watts,
            direct_count,
            reading.readings.len(),
            projection.daily,
            config.pricing.currency_symbol,
            projection.monthly,
            config.pricing.currency_symbol,
        );
        io::stdout().flush()?;
    }
}
