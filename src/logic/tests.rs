use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logic::channels::ChannelValues;
use crate::logic::error::{PipelineError, StorageError};
use crate::logic::hub::PipelineEvent;
use crate::logic::pipeline::Pipeline;
use crate::logic::storage::{SqliteStorage, Storage};
use crate::logic::types::{
    Alert, Classification, Equipment, EquipmentStatus, MaintenanceTask, Prediction,
    SensorReading, Severity, TaskPriority,
};

fn seeded_pipeline() -> (Arc<Pipeline>, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.seed_default_fleet().unwrap();
    let pipeline = Arc::new(Pipeline::new(storage.clone()));
    (pipeline, storage)
}

/// Baseline reading around 70 degrees with a small repeating jitter so
/// the window has spread without any reading standing out.
fn baseline_reading(i: usize) -> ChannelValues {
    ChannelValues {
        temperature: 70.0 + (i % 5) as f64 * 0.3,
        vibration: 3.0,
        pressure: 120.0,
        power_consumption: 85.0,
        efficiency: 92.0,
    }
}

#[test]
fn test_cold_start_always_normal_zero() {
    let (pipeline, storage) = seeded_pipeline();

    for i in 0..19 {
        let outcome = pipeline.submit_reading(1, baseline_reading(i)).unwrap();
        assert_eq!(outcome.classification, Classification::Normal);
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.recommendation.is_none());
    }

    assert!(storage.recent_alerts(10, None).unwrap().is_empty());
    let status = pipeline.model_status(1).unwrap();
    assert!(!status.is_ready);
    assert!(!status.is_trained);
}

#[test]
fn test_temperature_spike_scenario() {
    let (pipeline, storage) = seeded_pipeline();
    let mut viewer = pipeline.subscribe();

    // Twenty readings in the normal range: all classified normal, no alerts.
    for i in 0..20 {
        let outcome = pipeline.submit_reading(1, baseline_reading(i)).unwrap();
        assert_eq!(outcome.classification, Classification::Normal);
    }
    assert!(storage.recent_alerts(10, None).unwrap().is_empty());
    assert!(viewer.try_recv().is_none());
    assert!(pipeline.model_status(1).unwrap().is_trained);

    // The 21st reading is a far outlier on temperature.
    let outcome = pipeline
        .submit_reading(
            1,
            ChannelValues {
                temperature: 150.0,
                ..baseline_reading(0)
            },
        )
        .unwrap();

    assert_eq!(outcome.classification, Classification::Anomalous);
    assert!(outcome.confidence >= 85.0, "confidence {}", outcome.confidence);
    assert_eq!(outcome.equipment_status, EquipmentStatus::Critical);
    assert!(outcome
        .recommendation
        .as_deref()
        .unwrap()
        .contains("Temperature exceeds normal range"));

    // Exactly one critical alert with a temperature-related message.
    let alerts = storage.recent_alerts(10, None).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert!(alerts[0].description.contains("cooling system"));

    // Exactly one high-priority task, scheduled ahead.
    let tasks = storage.pending_tasks().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].priority, TaskPriority::High);
    assert!(tasks[0].scheduled_date > alerts[0].timestamp);

    // Status persisted before the broadcast went out.
    let equipment = storage.equipment(1).unwrap().unwrap();
    assert_eq!(equipment.status, EquipmentStatus::Critical);

    match viewer.try_recv() {
        Some(PipelineEvent::AlertCreated { alert }) => {
            assert_eq!(alert.equipment_id, 1);
            assert_eq!(alert.severity, Severity::Critical);
        }
        other => panic!("expected AlertCreated, got {:?}", other),
    }
    match viewer.try_recv() {
        Some(PipelineEvent::StatusChanged {
            equipment_id,
            new_status,
        }) => {
            assert_eq!(equipment_id, 1);
            assert_eq!(new_status, EquipmentStatus::Critical);
        }
        other => panic!("expected StatusChanged, got {:?}", other),
    }
}

#[test]
fn test_status_recovers_on_normal_reading() {
    let (pipeline, storage) = seeded_pipeline();

    for i in 0..20 {
        pipeline.submit_reading(2, baseline_reading(i)).unwrap();
    }
    pipeline
        .submit_reading(
            2,
            ChannelValues {
                temperature: 150.0,
                ..baseline_reading(0)
            },
        )
        .unwrap();
    assert_eq!(
        storage.equipment(2).unwrap().unwrap().status,
        EquipmentStatus::Critical
    );

    // A central, ordinary reading: classified normal, status back to
    // healthy (the most recent reading was normal).
    let outcome = pipeline.submit_reading(2, baseline_reading(2)).unwrap();
    assert_eq!(outcome.classification, Classification::Normal);
    assert_eq!(outcome.equipment_status, EquipmentStatus::Healthy);
    assert_eq!(
        storage.equipment(2).unwrap().unwrap().status,
        EquipmentStatus::Healthy
    );
}

#[test]
fn test_rejected_reading_leaves_no_trace() {
    let (pipeline, storage) = seeded_pipeline();

    let err = pipeline
        .submit_reading(
            3,
            ChannelValues {
                vibration: f64::NAN,
                ..baseline_reading(0)
            },
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));

    // Not recorded in history, not in any window.
    assert!(storage.load_recent(3, 10).unwrap().is_empty());
    assert!(pipeline.model_status(3).is_none());
    assert_eq!(pipeline.stats().readings_processed, 0);
}

#[test]
fn test_unknown_equipment_rejected() {
    let (pipeline, _storage) = seeded_pipeline();
    let err = pipeline
        .submit_reading(42, baseline_reading(0))
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownEquipment(42)));
}

// ============================================================================
// PERSISTENCE FAILURE ISOLATION
// ============================================================================

/// Delegates to SQLite but fails alert writes on demand.
struct FailingStorage {
    inner: SqliteStorage,
    fail_alerts: AtomicBool,
}

impl Storage for FailingStorage {
    fn equipment(&self, equipment_id: i64) -> Result<Option<Equipment>, StorageError> {
        self.inner.equipment(equipment_id)
    }
    fn all_equipment(&self) -> Result<Vec<Equipment>, StorageError> {
        self.inner.all_equipment()
    }
    fn save_reading(&self, reading: &SensorReading) -> Result<(), StorageError> {
        self.inner.save_reading(reading)
    }
    fn load_recent(
        &self,
        equipment_id: i64,
        limit: usize,
    ) -> Result<Vec<SensorReading>, StorageError> {
        self.inner.load_recent(equipment_id, limit)
    }
    fn save_prediction(&self, prediction: &Prediction) -> Result<(), StorageError> {
        self.inner.save_prediction(prediction)
    }
    fn save_alert(&self, alert: &Alert) -> Result<(), StorageError> {
        if self.fail_alerts.load(Ordering::Relaxed) {
            return Err(StorageError::Corrupt("injected alert failure".to_string()));
        }
        self.inner.save_alert(alert)
    }
    fn save_task(&self, task: &MaintenanceTask) -> Result<(), StorageError> {
        self.inner.save_task(task)
    }
    fn update_equipment_status(
        &self,
        equipment_id: i64,
        status: EquipmentStatus,
    ) -> Result<(), StorageError> {
        self.inner.update_equipment_status(equipment_id, status)
    }
}

#[test]
fn test_persistence_failure_surfaces_and_suppresses_broadcast() {
    let inner = SqliteStorage::open_in_memory().unwrap();
    inner.seed_default_fleet().unwrap();
    let storage = Arc::new(FailingStorage {
        inner,
        fail_alerts: AtomicBool::new(true),
    });
    let pipeline = Arc::new(Pipeline::new(storage.clone()));
    let mut viewer = pipeline.subscribe();

    for i in 0..20 {
        pipeline.submit_reading(1, baseline_reading(i)).unwrap();
    }

    let err = pipeline
        .submit_reading(
            1,
            ChannelValues {
                temperature: 150.0,
                ..baseline_reading(0)
            },
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::Persistence(_)));

    // Unsaved state never reaches viewers.
    assert!(viewer.try_recv().is_none());

    // The failure degraded one reading, not the pipeline: the next
    // reading processes normally.
    storage.fail_alerts.store(false, Ordering::Relaxed);
    let outcome = pipeline.submit_reading(1, baseline_reading(1)).unwrap();
    assert_eq!(outcome.classification, Classification::Normal);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_equipment_process_independently() {
    let (pipeline, _storage) = seeded_pipeline();

    let mut handles = Vec::new();
    for equipment_id in [1i64, 2] {
        let pipeline = pipeline.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..30 {
                pipeline
                    .submit_reading(equipment_id, baseline_reading(i))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pipeline.stats().readings_processed, 60);
    for equipment_id in [1i64, 2] {
        let status = pipeline.model_status(equipment_id).unwrap();
        assert_eq!(status.total_recorded, 30);
        assert!(status.is_trained);
    }
}

#[test]
fn test_same_equipment_submissions_serialize() {
    let (pipeline, _storage) = seeded_pipeline();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let pipeline = pipeline.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..20 {
                pipeline.submit_reading(4, baseline_reading(i)).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let status = pipeline.model_status(4).unwrap();
    // No lost updates: every reading landed in the window.
    assert_eq!(status.total_recorded, 40);
    // Training fired exactly once, at the 20th arrival, and later
    // submissions observed the trained model.
    assert_eq!(status.train_count, 1);
    assert_eq!(status.readings_since_train, 20);
}
