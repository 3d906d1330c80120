//! AI Predictive Maintenance Core - Main Entry Point

mod constants;
mod logic;

use std::sync::Arc;

use tokio::time::Duration;

use logic::detector::DetectorConfig;
use logic::model::StoreConfig;
use logic::pipeline::Pipeline;
use logic::policy::PolicyConfig;
use logic::simulator::Simulator;
use logic::storage::SqliteStorage;

/// Seconds between fleet summary log lines.
const SUMMARY_INTERVAL_SECS: u64 = 30;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!(
        "Starting {} v{}...",
        constants::APP_NAME,
        constants::APP_VERSION
    );

    let db_path = constants::get_db_path();
    let storage = match SqliteStorage::open(&db_path) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            log::error!("Failed to open database {}: {}", db_path, e);
            std::process::exit(1);
        }
    };
    log::info!("Database ready at {}", db_path);

    match storage.seed_default_fleet() {
        Ok(true) => log::info!("Equipment fleet seeded"),
        Ok(false) => log::info!("Equipment fleet already present"),
        Err(e) => log::error!("Fleet seeding failed: {}", e),
    }

    let pipeline = Arc::new(Pipeline::with_config(
        storage.clone(),
        StoreConfig::from_env(),
        DetectorConfig::default(),
        PolicyConfig::from_env(),
    ));

    match pipeline.hydrate() {
        Ok(0) => log::info!("No stored history, models start cold"),
        Ok(n) => log::info!("Model windows hydrated from {} stored readings", n),
        Err(e) => log::warn!("Hydration failed, models start cold: {}", e),
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    rt.block_on(async {
        // Demo viewer: logs every broadcast event as JSON, the same
        // stream a real-time transport would forward to dashboards.
        let mut viewer = pipeline.subscribe();
        tokio::spawn(async move {
            while let Some(event) = viewer.recv().await {
                match serde_json::to_string(&event) {
                    Ok(json) => log::info!("[EVENT] {}", json),
                    Err(e) => log::error!("Event serialization failed: {}", e),
                }
            }
        });

        if constants::is_simulator_enabled() {
            let simulator = Simulator::new(pipeline.clone(), constants::get_sim_cycle_secs());
            tokio::spawn(simulator.run());
        } else {
            log::info!("Simulator disabled, waiting for external readings");
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(SUMMARY_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            match storage.fleet_summary() {
                Ok(summary) => log::info!(
                    "Fleet: {}/{} healthy, {} warning, {} critical, {} active alerts | {}",
                    summary.healthy,
                    summary.total_equipment,
                    summary.warning,
                    summary.critical,
                    summary.active_alerts,
                    pipeline.stats()
                ),
                Err(e) => log::error!("Fleet summary failed: {}", e),
            }
        }
    });
}
