//! Central Configuration Constants
//!
//! Single source of truth for all tuning defaults.
//! To change a detection threshold or cadence, only edit this file.

/// Minimum readings an equipment needs before its model can train.
/// Below this the detector stays in cold start and reports normal/0.
pub const DEFAULT_MIN_TRAIN_READINGS: usize = 20;

/// Rolling training window per equipment (FIFO evicted).
pub const DEFAULT_WINDOW_SIZE: usize = 200;

/// Retrain after this many new readings since the last training.
pub const DEFAULT_RETRAIN_INTERVAL: usize = 50;

/// Expected fraction of abnormal readings in historical data.
pub const CONTAMINATION: f64 = 0.1;

/// Trees in the isolation forest.
pub const FOREST_TREES: usize = 100;

/// Per-tree subsample ceiling.
pub const FOREST_MAX_SAMPLES: usize = 256;

/// Fixed RNG seed so identical windows always fit identical forests.
pub const FOREST_SEED: u64 = 42;

/// Confidence at or above which an anomaly raises a warning alert.
pub const DEFAULT_WARNING_CONFIDENCE: f64 = 70.0;

/// Confidence at or above which an anomaly raises a critical alert
/// and schedules a maintenance task.
pub const DEFAULT_CRITICAL_CONFIDENCE: f64 = 85.0;

/// Days ahead a high-priority maintenance task is scheduled.
pub const DEFAULT_TASK_LEAD_DAYS: i64 = 2;

/// Budget for a single retrain pass (milliseconds). On expiry the
/// previous model keeps scoring and the retrain stays pending.
pub const DEFAULT_RETRAIN_TIMEOUT_MS: u64 = 2_000;

/// Default SQLite database file.
pub const DEFAULT_DB_PATH: &str = "maintenance.db";

/// Seconds between simulator reading cycles.
pub const DEFAULT_SIM_CYCLE_SECS: u64 = 10;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "AI-Maintenance";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get database path from environment or use default
pub fn get_db_path() -> String {
    std::env::var("MAINT_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

/// Get warning confidence threshold from environment or use default
pub fn get_warning_confidence() -> f64 {
    std::env::var("MAINT_WARNING_CONFIDENCE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_WARNING_CONFIDENCE)
}

/// Get critical confidence threshold from environment or use default
pub fn get_critical_confidence() -> f64 {
    std::env::var("MAINT_CRITICAL_CONFIDENCE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CRITICAL_CONFIDENCE)
}

/// Get minimum training history from environment or use default
pub fn get_min_train_readings() -> usize {
    std::env::var("MAINT_MIN_TRAIN_READINGS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MIN_TRAIN_READINGS)
}

/// Get retrain interval from environment or use default
pub fn get_retrain_interval() -> usize {
    std::env::var("MAINT_RETRAIN_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_RETRAIN_INTERVAL)
}

/// Get simulator cycle seconds from environment or use default
pub fn get_sim_cycle_secs() -> u64 {
    std::env::var("MAINT_SIM_CYCLE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SIM_CYCLE_SECS)
}

/// Check if the synthetic sensor feed is enabled
pub fn is_simulator_enabled() -> bool {
    std::env::var("MAINT_SIMULATOR")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}
