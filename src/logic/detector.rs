//! Anomaly Detector
//!
//! Records each incoming reading into its equipment's window, retrains
//! the model when due, and scores the reading — all under that
//! equipment's lock, so a retrain can never race the score that depends
//! on it and scoring always sees the freshest successfully-trained model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::constants;
use crate::logic::channels::{ChannelValues, ChannelVector, CHANNEL_COUNT};
use crate::logic::error::TrainingError;
use crate::logic::model::ModelStore;
use crate::logic::types::Classification;

/// Raw forest score mapped to confidence: 0.5 (an ordinary point) maps
/// to 0, and the scale stretches the usable upper band so a clear
/// outlier lands in the 80-100 range.
const CONFIDENCE_MIDPOINT: f64 = 0.5;
const CONFIDENCE_SCALE: f64 = 250.0;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Budget for one retrain pass before falling back to the previous model.
    pub retrain_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            retrain_timeout_ms: constants::DEFAULT_RETRAIN_TIMEOUT_MS,
        }
    }
}

/// Outcome of scoring one reading.
#[derive(Debug, Clone)]
pub struct Detection {
    pub classification: Classification,
    /// 0-100, monotonically increasing with "more anomalous".
    pub confidence: f64,
    /// Raw forest score the confidence was derived from.
    pub raw_score: f64,
    /// Per-channel z-deviations against the model's scaler. Zero during
    /// cold start.
    pub deviations: ChannelVector,
    /// Scored against a model that is older than intended because the
    /// last retrain failed or timed out.
    pub stale: bool,
}

impl Detection {
    fn cold_start() -> Self {
        Self {
            classification: Classification::Normal,
            confidence: 0.0,
            raw_score: 0.0,
            deviations: [0.0; CHANNEL_COUNT],
            stale: false,
        }
    }
}

pub struct Detector {
    store: Arc<ModelStore>,
    config: DetectorConfig,
}

impl Detector {
    pub fn new(store: Arc<ModelStore>, config: DetectorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Record and score one reading.
    ///
    /// Holds the equipment's model lock for the whole
    /// record -> retrain-if-due -> score sequence; concurrent readings
    /// for the same equipment queue here in arrival order.
    pub fn score(&self, equipment_id: i64, channels: &ChannelValues) -> Detection {
        let handle = self.store.get_or_create(equipment_id);
        let mut model = handle.lock();

        model.record(channels);

        if !model.is_ready() {
            return Detection::cold_start();
        }

        if model.should_retrain() {
            let deadline =
                Instant::now() + Duration::from_millis(self.config.retrain_timeout_ms);
            match model.train(Some(deadline)) {
                Ok(()) => {
                    log::debug!(
                        "Equipment {} model trained ({} window readings)",
                        equipment_id,
                        model.status().window_len
                    );
                }
                Err(TrainingError::Timeout { elapsed_ms }) => {
                    log::warn!(
                        "Equipment {} retrain timed out after {}ms, scoring with previous model",
                        equipment_id,
                        elapsed_ms
                    );
                }
                Err(e) => {
                    log::error!(
                        "Equipment {} retrain failed: {}. Previous model retained",
                        equipment_id,
                        e
                    );
                }
            }
        }

        match model.score(channels) {
            Some(scored) => {
                let confidence = ((scored.raw_score - CONFIDENCE_MIDPOINT) * CONFIDENCE_SCALE)
                    .clamp(0.0, 100.0);
                let classification = if scored.is_outlier {
                    Classification::Anomalous
                } else {
                    Classification::Normal
                };
                Detection {
                    classification,
                    confidence,
                    raw_score: scored.raw_score,
                    deviations: scored.deviations,
                    stale: model.is_stale(),
                }
            }
            // Ready but no model yet: the very first training attempt
            // failed. Stay in cold-start behavior until one succeeds.
            None => Detection {
                stale: true,
                ..Detection::cold_start()
            },
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
