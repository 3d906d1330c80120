//! Pipeline Coordinator
//!
//! Wires the stages for one reading:
//!
//! ```text
//! Received -> Scored -> Policy-Evaluated -> Persisted -> Broadcast -> Done
//! ```
//!
//! Persistence always precedes broadcast: viewers must never be shown
//! state that did not reach storage, so a persistence failure suppresses
//! the affected events and surfaces to the submitter instead. Readings
//! are processed independently; there is no cross-reading transaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::logic::channels::ChannelValues;
use crate::logic::detector::{Detector, DetectorConfig};
use crate::logic::error::{PipelineError, PipelineResult, StorageError};
use crate::logic::hub::{BroadcastHub, PipelineEvent, Subscription};
use crate::logic::ingest;
use crate::logic::model::{ModelStatus, ModelStore, StoreConfig};
use crate::logic::policy::{AlertPolicy, PolicyConfig};
use crate::logic::storage::Storage;
use crate::logic::types::{Classification, EquipmentStatus, SensorReading};

/// Synchronous result handed back to the submitter, on top of whatever
/// was broadcast asynchronously.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub classification: Classification,
    pub confidence: f64,
    pub recommendation: Option<String>,
    pub equipment_status: EquipmentStatus,
}

pub struct Pipeline {
    storage: Arc<dyn Storage>,
    detector: Detector,
    policy: AlertPolicy,
    hub: Arc<BroadcastHub>,
    readings_processed: AtomicU64,
    anomalies_detected: AtomicU64,
    alerts_raised: AtomicU64,
    tasks_scheduled: AtomicU64,
}

impl Pipeline {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_config(
            storage,
            StoreConfig::default(),
            DetectorConfig::default(),
            PolicyConfig::default(),
        )
    }

    pub fn with_config(
        storage: Arc<dyn Storage>,
        store_config: StoreConfig,
        detector_config: DetectorConfig,
        policy_config: PolicyConfig,
    ) -> Self {
        let store = Arc::new(ModelStore::new(store_config));
        Self {
            storage,
            detector: Detector::new(store, detector_config),
            policy: AlertPolicy::new(policy_config),
            hub: Arc::new(BroadcastHub::new()),
            readings_processed: AtomicU64::new(0),
            anomalies_detected: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            tasks_scheduled: AtomicU64::new(0),
        }
    }

    /// Subscription entry point for the real-time transport layer.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub fn unsubscribe(&self, viewer_id: u64) -> bool {
        self.hub.unsubscribe(viewer_id)
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn model_status(&self, equipment_id: i64) -> Option<ModelStatus> {
        self.detector.store().status(equipment_id)
    }

    /// Warm per-equipment model windows from stored history, so a
    /// restart does not reset every model to cold start.
    pub fn hydrate(&self) -> Result<usize, StorageError> {
        let window_size = self.detector.store().config().window_size;
        let mut loaded = 0;

        for equipment in self.storage.all_equipment()? {
            let readings = self.storage.load_recent(equipment.id, window_size)?;
            if readings.is_empty() {
                continue;
            }
            let handle = self.detector.store().get_or_create(equipment.id);
            let mut model = handle.lock();
            for reading in &readings {
                model.record(&reading.channels);
            }
            loaded += readings.len();
        }

        if loaded > 0 {
            log::info!("Hydrated model windows with {} stored readings", loaded);
        }
        Ok(loaded)
    }

    /// Ingestion entry point: process one reading through every stage.
    pub fn submit_reading(
        &self,
        equipment_id: i64,
        channels: ChannelValues,
    ) -> PipelineResult<SubmitOutcome> {
        // Received: reject malformed input before it can touch history.
        ingest::validate_channels(&channels)?;
        let equipment = self
            .persist("equipment lookup", self.storage.equipment(equipment_id))?
            .ok_or(PipelineError::UnknownEquipment(equipment_id))?;

        let reading = SensorReading::new(equipment_id, channels);

        // Scored: record + retrain-if-due + score under the per-id lock.
        let detection = self.detector.score(equipment_id, &channels);

        // Policy-Evaluated.
        let decision = self.policy.evaluate(&equipment, &reading, &detection);

        // Persisted: everything lands in storage before any broadcast.
        self.persist("reading", self.storage.save_reading(&reading))?;
        if let Some(prediction) = &decision.prediction {
            self.persist("prediction", self.storage.save_prediction(prediction))?;
        }
        if let Some(alert) = &decision.alert {
            self.persist("alert", self.storage.save_alert(alert))?;
        }
        if let Some(task) = &decision.task {
            self.persist("task", self.storage.save_task(task))?;
        }
        let status_changed = decision.new_status != equipment.status;
        if status_changed {
            self.persist(
                "status update",
                self.storage
                    .update_equipment_status(equipment_id, decision.new_status),
            )?;
        }

        // Broadcast.
        if let Some(alert) = &decision.alert {
            log::warn!(
                "[ANOMALY] {} severity={} confidence={:.1}{}",
                equipment.name,
                alert.severity.as_str(),
                detection.confidence,
                if detection.stale { " (stale model)" } else { "" }
            );
            self.hub.publish(&PipelineEvent::AlertCreated {
                alert: alert.clone(),
            });
        }
        if status_changed {
            self.hub.publish(&PipelineEvent::StatusChanged {
                equipment_id,
                new_status: decision.new_status,
            });
        }

        self.readings_processed.fetch_add(1, Ordering::Relaxed);
        if detection.classification.is_anomalous() {
            self.anomalies_detected.fetch_add(1, Ordering::Relaxed);
        }
        if decision.alert.is_some() {
            self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        }
        if decision.task.is_some() {
            self.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
        }

        Ok(SubmitOutcome {
            classification: detection.classification,
            confidence: detection.confidence,
            recommendation: decision
                .prediction
                .map(|p| p.recommendation),
            equipment_status: decision.new_status,
        })
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            readings_processed: self.readings_processed.load(Ordering::Relaxed),
            anomalies_detected: self.anomalies_detected.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            tasks_scheduled: self.tasks_scheduled.load(Ordering::Relaxed),
            viewers: self.hub.viewer_count(),
        }
    }

    fn persist<T>(&self, what: &str, result: Result<T, StorageError>) -> PipelineResult<T> {
        result.map_err(|e| {
            log::error!("Persistence failure ({what}): {e}");
            PipelineError::Persistence(e)
        })
    }
}

/// Pipeline counters.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub readings_processed: u64,
    pub anomalies_detected: u64,
    pub alerts_raised: u64,
    pub tasks_scheduled: u64,
    pub viewers: usize,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} readings, {} anomalies, {} alerts, {} tasks, {} viewers",
            self.readings_processed,
            self.anomalies_detected,
            self.alerts_raised,
            self.tasks_scheduled,
            self.viewers
        )
    }
}
