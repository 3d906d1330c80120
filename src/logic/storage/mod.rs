//! Storage Collaborator Contract
//!
//! The pipeline persists through this seam and nothing else, so tests
//! and alternative backends can swap the implementation without touching
//! the coordinator.

pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::logic::error::StorageError;
use crate::logic::types::{
    Alert, Equipment, EquipmentStatus, MaintenanceTask, Prediction, SensorReading,
};

pub trait Storage: Send + Sync {
    /// Look up one registered equipment unit.
    fn equipment(&self, equipment_id: i64) -> Result<Option<Equipment>, StorageError>;

    fn all_equipment(&self) -> Result<Vec<Equipment>, StorageError>;

    fn save_reading(&self, reading: &SensorReading) -> Result<(), StorageError>;

    /// Most recent readings for one equipment, oldest first, at most
    /// `limit` of them. Used to warm model windows at startup.
    fn load_recent(
        &self,
        equipment_id: i64,
        limit: usize,
    ) -> Result<Vec<SensorReading>, StorageError>;

    fn save_prediction(&self, prediction: &Prediction) -> Result<(), StorageError>;

    fn save_alert(&self, alert: &Alert) -> Result<(), StorageError>;

    fn save_task(&self, task: &MaintenanceTask) -> Result<(), StorageError>;

    /// Must complete before the matching status broadcast goes out, so
    /// dashboard reads after the event see the new status.
    fn update_equipment_status(
        &self,
        equipment_id: i64,
        status: EquipmentStatus,
    ) -> Result<(), StorageError>;
}
