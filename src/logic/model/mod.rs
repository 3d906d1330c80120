//! Equipment Model Store
//!
//! Owns one anomaly model (isolation forest + channel scaler) per
//! equipment id, together with the rolling window of recent readings it
//! trains on. All mutable state is partitioned by equipment id: the map
//! lock is only held to fetch a handle, and everything heavier (record,
//! retrain, score) happens under that equipment's own mutex, so
//! different equipment ids proceed fully in parallel.

pub mod forest;
pub mod scaler;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::constants;
use crate::logic::channels::{ChannelVector, ChannelValues};
use crate::logic::error::TrainingError;

use forest::IsolationForest;
use scaler::ChannelScaler;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Rolling window capacity (FIFO evicted).
    pub window_size: usize,
    /// Readings required before the first training.
    pub min_train_readings: usize,
    /// New readings between retrains once trained.
    pub retrain_interval: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            window_size: constants::DEFAULT_WINDOW_SIZE,
            min_train_readings: constants::DEFAULT_MIN_TRAIN_READINGS,
            retrain_interval: constants::DEFAULT_RETRAIN_INTERVAL,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            min_train_readings: constants::get_min_train_readings(),
            retrain_interval: constants::get_retrain_interval(),
            ..Default::default()
        }
    }
}

// ============================================================================
// PER-EQUIPMENT MODEL
// ============================================================================

/// Shared, per-equipment handle. Lock it to record/train/score as one
/// critical section; concurrent submissions for the same equipment wait
/// here instead of racing the retrain-and-score sequence.
pub type ModelHandle = Arc<Mutex<EquipmentModel>>;

pub struct EquipmentModel {
    window: VecDeque<ChannelVector>,
    scaler: Option<ChannelScaler>,
    forest: Option<IsolationForest>,
    total_recorded: u64,
    readings_since_train: usize,
    train_count: u32,
    last_trained: Option<DateTime<Utc>>,
    /// Last retrain attempt failed or timed out; scores are being
    /// produced by the previous model until a retrain succeeds.
    stale: bool,
    config: StoreConfig,
}

/// Result of scoring one normalized sample.
pub struct ScoredSample {
    /// Raw forest score in (0, 1).
    pub raw_score: f64,
    /// Binary label from the contamination-derived threshold.
    pub is_outlier: bool,
    /// Per-channel z-deviations of the sample against the scaler.
    pub deviations: ChannelVector,
}

impl EquipmentModel {
    fn new(config: StoreConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window_size),
            scaler: None,
            forest: None,
            total_recorded: 0,
            readings_since_train: 0,
            train_count: 0,
            last_trained: None,
            stale: false,
            config,
        }
    }

    /// Append a reading to the window, evicting the oldest when full.
    pub fn record(&mut self, channels: &ChannelValues) {
        if self.window.len() >= self.config.window_size {
            self.window.pop_front();
        }
        self.window.push_back(channels.to_vector());
        self.total_recorded += 1;
        self.readings_since_train += 1;
    }

    /// Enough history to train at all?
    pub fn is_ready(&self) -> bool {
        self.window.len() >= self.config.min_train_readings
    }

    /// Due for (re)training: first time readiness is reached, then every
    /// `retrain_interval` readings. A failed or timed-out retrain leaves
    /// the counter untouched, so the attempt repeats on the next reading.
    pub fn should_retrain(&self) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.forest {
            None => true,
            Some(_) => self.readings_since_train >= self.config.retrain_interval,
        }
    }

    /// Refit scaler and forest on the current window.
    pub fn train(&mut self, deadline: Option<Instant>) -> Result<(), TrainingError> {
        let samples: Vec<ChannelVector> = self.window.iter().copied().collect();
        let scaler = ChannelScaler::fit(&samples);
        let scaled = scaler.transform_all(&samples);

        match IsolationForest::fit(&scaled, deadline) {
            Ok(forest) => {
                self.scaler = Some(scaler);
                self.forest = Some(forest);
                self.readings_since_train = 0;
                self.train_count += 1;
                self.last_trained = Some(Utc::now());
                self.stale = false;
                Ok(())
            }
            Err(e) => {
                self.stale = true;
                Err(e)
            }
        }
    }

    /// Score one reading against the current model, if any.
    pub fn score(&self, channels: &ChannelValues) -> Option<ScoredSample> {
        let scaler = self.scaler.as_ref()?;
        let forest = self.forest.as_ref()?;

        let deviations = scaler.transform(&channels.to_vector());
        let raw_score = forest.score(&deviations);
        Some(ScoredSample {
            raw_score,
            is_outlier: forest.is_anomalous(raw_score),
            deviations,
        })
    }

    pub fn is_trained(&self) -> bool {
        self.forest.is_some()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            window_len: self.window.len(),
            window_capacity: self.config.window_size,
            fill_percent: (self.window.len() as f32 / self.config.window_size as f32 * 100.0)
                .min(100.0),
            is_ready: self.is_ready(),
            is_trained: self.is_trained(),
            total_recorded: self.total_recorded,
            readings_since_train: self.readings_since_train,
            train_count: self.train_count,
            stale: self.stale,
            last_trained: self.last_trained,
        }
    }
}

/// Model state snapshot for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub window_len: usize,
    pub window_capacity: usize,
    pub fill_percent: f32,
    pub is_ready: bool,
    pub is_trained: bool,
    pub total_recorded: u64,
    pub readings_since_train: usize,
    pub train_count: u32,
    pub stale: bool,
    pub last_trained: Option<DateTime<Utc>>,
}

// ============================================================================
// STORE
// ============================================================================

/// Process-wide store, created at startup and shared behind an `Arc`.
pub struct ModelStore {
    config: StoreConfig,
    slots: RwLock<HashMap<i64, ModelHandle>>,
}

impl ModelStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Fetch or create the handle for one equipment id.
    pub fn get_or_create(&self, equipment_id: i64) -> ModelHandle {
        if let Some(handle) = self.slots.read().get(&equipment_id) {
            return handle.clone();
        }

        let mut slots = self.slots.write();
        slots
            .entry(equipment_id)
            .or_insert_with(|| Arc::new(Mutex::new(EquipmentModel::new(self.config.clone()))))
            .clone()
    }

    /// Append a reading to the equipment's window.
    pub fn record(&self, equipment_id: i64, channels: &ChannelValues) {
        self.get_or_create(equipment_id).lock().record(channels);
    }

    pub fn is_ready(&self, equipment_id: i64) -> bool {
        self.get_or_create(equipment_id).lock().is_ready()
    }

    pub fn should_retrain(&self, equipment_id: i64) -> bool {
        self.get_or_create(equipment_id).lock().should_retrain()
    }

    /// Snapshot of one equipment's model state.
    pub fn status(&self, equipment_id: i64) -> Option<ModelStatus> {
        self.slots
            .read()
            .get(&equipment_id)
            .map(|h| h.lock().status())
    }

    pub fn tracked_equipment(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.slots.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

// ============================================================================
// TESTS
// ============================================================================
