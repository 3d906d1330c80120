//! SQLite storage backend.
//!
//! Single bundled-SQLite connection behind a mutex; every write is one
//! small statement, so contention stays negligible next to scoring.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::logic::channels::ChannelValues;
use crate::logic::error::StorageError;
use crate::logic::types::{
    Alert, Equipment, EquipmentStatus, MaintenanceTask, Prediction, SensorReading, Severity,
    TaskStatus,
};

use super::Storage;

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS equipment (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                location TEXT,
                status TEXT NOT NULL DEFAULT 'healthy'
            );
            CREATE TABLE IF NOT EXISTS sensor_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                equipment_id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                temperature REAL NOT NULL,
                vibration REAL NOT NULL,
                pressure REAL NOT NULL,
                power_consumption REAL NOT NULL,
                efficiency REAL NOT NULL,
                FOREIGN KEY (equipment_id) REFERENCES equipment (id)
            );
            CREATE INDEX IF NOT EXISTS idx_readings_equipment_time
                ON sensor_readings (equipment_id, timestamp);
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                equipment_id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                classification TEXT NOT NULL,
                confidence REAL NOT NULL,
                predicted_failure TEXT NOT NULL,
                recommendation TEXT NOT NULL,
                FOREIGN KEY (equipment_id) REFERENCES equipment (id)
            );
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                equipment_id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                acknowledged INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (equipment_id) REFERENCES equipment (id)
            );
            CREATE TABLE IF NOT EXISTS maintenance_schedule (
                id TEXT PRIMARY KEY,
                equipment_id INTEGER NOT NULL,
                task TEXT NOT NULL,
                scheduled_date TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                FOREIGN KEY (equipment_id) REFERENCES equipment (id)
            );",
        )?;
        Ok(())
    }

    /// Register one equipment unit, replacing an existing row with the
    /// same id.
    pub fn register_equipment(&self, equipment: &Equipment) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO equipment (id, name, category, location, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                equipment.id,
                equipment.name,
                equipment.category,
                equipment.location,
                equipment.status.as_str()
            ],
        )?;
        Ok(())
    }

    /// Seed the demo fleet if the equipment table is empty.
    pub fn seed_default_fleet(&self) -> Result<bool, StorageError> {
        {
            let conn = self.conn.lock();
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM equipment", [], |row| row.get(0))?;
            if count > 0 {
                return Ok(false);
            }
        }

        let fleet = [
            (1, "Hydraulic Press #1", "press", "Factory Floor A"),
            (2, "CNC Mill #3", "mill", "Workshop B"),
            (3, "Compressor Unit A", "compressor", "Utility Room"),
            (4, "Conveyor Belt #2", "conveyor", "Assembly Line"),
            (5, "Injection Molder #1", "molder", "Production Zone C"),
            (6, "Packaging Robot #4", "robot", "Packaging Area"),
        ];
        for (id, name, category, location) in fleet {
            self.register_equipment(&Equipment {
                id,
                name: name.to_string(),
                category: category.to_string(),
                location: Some(location.to_string()),
                status: EquipmentStatus::Healthy,
            })?;
        }
        log::info!("Seeded default fleet ({} units)", fleet.len());
        Ok(true)
    }

    /// Latest alerts, newest first, optionally filtered by
    /// acknowledgement state.
    pub fn recent_alerts(
        &self,
        limit: usize,
        acknowledged: Option<bool>,
    ) -> Result<Vec<Alert>, StorageError> {
        let conn = self.conn.lock();
        let mut sql = String::from(
            "SELECT id, equipment_id, timestamp, severity, title, description, acknowledged
             FROM alerts",
        );
        if let Some(flag) = acknowledged {
            sql.push_str(if flag {
                " WHERE acknowledged = 1"
            } else {
                " WHERE acknowledged = 0"
            });
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ?1");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], alert_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Mark one alert acknowledged. Returns false when no such alert.
    pub fn acknowledge_alert(&self, alert_id: Uuid) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE alerts SET acknowledged = 1 WHERE id = ?1",
            params![alert_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Open maintenance work ordered by scheduled date.
    pub fn pending_tasks(&self) -> Result<Vec<MaintenanceTask>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, equipment_id, task, scheduled_date, priority, status, created_at
             FROM maintenance_schedule
             WHERE status != 'completed'
             ORDER BY scheduled_date ASC",
        )?;
        let rows = stmt.query_map([], task_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Aggregate counters for the dashboard's headline row.
    pub fn fleet_summary(&self) -> Result<FleetSummary, StorageError> {
        let conn = self.conn.lock();
        let count = |status: &str| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM equipment WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )
        };

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM equipment", [], |row| row.get(0))?;
        let healthy = count("healthy")?;
        let warning = count("warning")?;
        let critical = count("critical")?;
        let active_alerts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM alerts WHERE acknowledged = 0",
            [],
            |row| row.get(0),
        )?;

        Ok(FleetSummary {
            total_equipment: total as usize,
            healthy: healthy as usize,
            warning: warning as usize,
            critical: critical as usize,
            active_alerts: active_alerts as usize,
        })
    }
}

/// Snapshot of fleet health for logs and dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSummary {
    pub total_equipment: usize,
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub active_alerts: usize,
}

impl Storage for SqliteStorage {
    fn equipment(&self, equipment_id: i64) -> Result<Option<Equipment>, StorageError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, category, location, status FROM equipment WHERE id = ?1",
            params![equipment_id],
            equipment_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn all_equipment(&self) -> Result<Vec<Equipment>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, category, location, status FROM equipment ORDER BY id")?;
        let rows = stmt.query_map([], equipment_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn save_reading(&self, reading: &SensorReading) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sensor_readings
             (equipment_id, timestamp, temperature, vibration, pressure, power_consumption, efficiency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                reading.equipment_id,
                reading.timestamp.to_rfc3339(),
                reading.channels.temperature,
                reading.channels.vibration,
                reading.channels.pressure,
                reading.channels.power_consumption,
                reading.channels.efficiency
            ],
        )?;
        Ok(())
    }

    fn load_recent(
        &self,
        equipment_id: i64,
        limit: usize,
    ) -> Result<Vec<SensorReading>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT equipment_id, timestamp, temperature, vibration, pressure,
                    power_consumption, efficiency
             FROM sensor_readings
             WHERE equipment_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![equipment_id, limit as i64], reading_from_row)?;
        let mut readings = rows.collect::<Result<Vec<_>, _>>()?;
        // Query returns newest first; windows consume oldest first.
        readings.reverse();
        Ok(readings)
    }

    fn save_prediction(&self, prediction: &Prediction) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO predictions
             (equipment_id, timestamp, classification, confidence, predicted_failure, recommendation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                prediction.equipment_id,
                prediction.timestamp.to_rfc3339(),
                prediction.classification.as_str(),
                prediction.confidence,
                prediction.predicted_failure.to_rfc3339(),
                prediction.recommendation
            ],
        )?;
        Ok(())
    }

    fn save_alert(&self, alert: &Alert) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO alerts (id, equipment_id, timestamp, severity, title, description, acknowledged)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                alert.id.to_string(),
                alert.equipment_id,
                alert.timestamp.to_rfc3339(),
                alert.severity.as_str(),
                alert.title,
                alert.description,
                alert.acknowledged as i64
            ],
        )?;
        Ok(())
    }

    fn save_task(&self, task: &MaintenanceTask) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO maintenance_schedule
             (id, equipment_id, task, scheduled_date, priority, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id.to_string(),
                task.equipment_id,
                task.task,
                task.scheduled_date.to_rfc3339(),
                task.priority.as_str(),
                task.status.as_str(),
                task.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn update_equipment_status(
        &self,
        equipment_id: i64,
        status: EquipmentStatus,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE equipment SET status = ?1 WHERE id = ?2",
            params![status.as_str(), equipment_id],
        )?;
        if changed == 0 {
            return Err(StorageError::Corrupt(format!(
                "status update for unknown equipment {equipment_id}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn equipment_from_row(row: &Row<'_>) -> Result<Equipment, rusqlite::Error> {
    let status_raw: String = row.get(4)?;
    Ok(Equipment {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        location: row.get(3)?,
        status: EquipmentStatus::parse(&status_raw).unwrap_or(EquipmentStatus::Healthy),
    })
}

fn reading_from_row(row: &Row<'_>) -> Result<SensorReading, rusqlite::Error> {
    Ok(SensorReading {
        equipment_id: row.get(0)?,
        timestamp: parse_timestamp(row.get(1)?)?,
        channels: ChannelValues {
            temperature: row.get(2)?,
            vibration: row.get(3)?,
            pressure: row.get(4)?,
            power_consumption: row.get(5)?,
            efficiency: row.get(6)?,
        },
    })
}

fn alert_from_row(row: &Row<'_>) -> Result<Alert, rusqlite::Error> {
    let id_raw: String = row.get(0)?;
    let severity_raw: String = row.get(3)?;
    let acknowledged: i64 = row.get(6)?;
    Ok(Alert {
        id: Uuid::parse_str(&id_raw).unwrap_or_else(|_| Uuid::nil()),
        equipment_id: row.get(1)?,
        timestamp: parse_timestamp(row.get(2)?)?,
        severity: Severity::parse(&severity_raw).unwrap_or(Severity::Warning),
        title: row.get(4)?,
        description: row.get(5)?,
        acknowledged: acknowledged != 0,
    })
}

fn task_from_row(row: &Row<'_>) -> Result<MaintenanceTask, rusqlite::Error> {
    let id_raw: String = row.get(0)?;
    let priority_raw: String = row.get(4)?;
    let status_raw: String = row.get(5)?;
    Ok(MaintenanceTask {
        id: Uuid::parse_str(&id_raw).unwrap_or_else(|_| Uuid::nil()),
        equipment_id: row.get(1)?,
        task: row.get(2)?,
        scheduled_date: parse_timestamp(row.get(3)?)?,
        priority: crate::logic::types::TaskPriority::parse(&priority_raw)
            .unwrap_or(crate::logic::types::TaskPriority::Medium),
        status: TaskStatus::parse(&status_raw).unwrap_or(TaskStatus::Pending),
        created_at: parse_timestamp(row.get(6)?)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reading_at(equipment_id: i64, offset_secs: i64, temp: f64) -> SensorReading {
        SensorReading {
            equipment_id,
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            channels: ChannelValues {
                temperature: temp,
                vibration: 3.0,
                pressure: 120.0,
                power_consumption: 85.0,
                efficiency: 92.0,
            },
        }
    }

    #[test]
    fn test_seed_is_idempotent() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.seed_default_fleet().unwrap());
        assert!(!storage.seed_default_fleet().unwrap());

        let fleet = storage.all_equipment().unwrap();
        assert_eq!(fleet.len(), 6);
        assert_eq!(fleet[0].name, "Hydraulic Press #1");
        assert!(fleet
            .iter()
            .all(|e| e.status == EquipmentStatus::Healthy));
    }

    #[test]
    fn test_load_recent_is_chronological_and_limited() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.seed_default_fleet().unwrap();

        for i in 0..10 {
            storage
                .save_reading(&reading_at(1, i, 70.0 + i as f64))
                .unwrap();
        }
        storage.save_reading(&reading_at(2, 0, 55.0)).unwrap();

        let recent = storage.load_recent(1, 4).unwrap();
        assert_eq!(recent.len(), 4);
        // Oldest of the kept four first, newest last.
        assert_eq!(recent[0].channels.temperature, 76.0);
        assert_eq!(recent[3].channels.temperature, 79.0);
        assert!(recent.iter().all(|r| r.equipment_id == 1));
    }

    #[test]
    fn test_status_update_round_trip() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.seed_default_fleet().unwrap();

        storage
            .update_equipment_status(3, EquipmentStatus::Critical)
            .unwrap();
        let eq = storage.equipment(3).unwrap().unwrap();
        assert_eq!(eq.status, EquipmentStatus::Critical);

        assert!(storage
            .update_equipment_status(99, EquipmentStatus::Warning)
            .is_err());
        assert!(storage.equipment(99).unwrap().is_none());
    }

    #[test]
    fn test_alert_save_list_acknowledge() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.seed_default_fleet().unwrap();

        let alert = Alert::new(
            2,
            Utc::now(),
            Severity::Critical,
            "CNC Mill #3 - Anomaly Detected".to_string(),
            "test alert".to_string(),
        );
        storage.save_alert(&alert).unwrap();

        let active = storage.recent_alerts(10, Some(false)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, alert.id);
        assert_eq!(active[0].severity, Severity::Critical);

        assert!(storage.acknowledge_alert(alert.id).unwrap());
        assert!(storage.recent_alerts(10, Some(false)).unwrap().is_empty());
        assert_eq!(storage.recent_alerts(10, None).unwrap().len(), 1);
        assert!(!storage.acknowledge_alert(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_task_and_prediction_persist() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.seed_default_fleet().unwrap();

        let now = Utc::now();
        storage
            .save_prediction(&Prediction {
                equipment_id: 4,
                timestamp: now,
                classification: crate::logic::types::Classification::Anomalous,
                confidence: 88.0,
                predicted_failure: Prediction::failure_horizon(now, 88.0),
                recommendation: "Check cooling system.".to_string(),
            })
            .unwrap();

        let task = MaintenanceTask::new(
            4,
            "Inspect Conveyor Belt #2".to_string(),
            now + Duration::days(2),
            crate::logic::types::TaskPriority::High,
        );
        storage.save_task(&task).unwrap();

        let pending = storage.pending_tasks().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, task.id);
        assert_eq!(pending[0].status, TaskStatus::Pending);
    }

    #[test]
    fn test_fleet_summary_counts() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.seed_default_fleet().unwrap();

        storage
            .update_equipment_status(1, EquipmentStatus::Critical)
            .unwrap();
        storage
            .update_equipment_status(2, EquipmentStatus::Warning)
            .unwrap();
        storage
            .save_alert(&Alert::new(
                1,
                Utc::now(),
                Severity::Critical,
                "t".to_string(),
                "d".to_string(),
            ))
            .unwrap();

        let summary = storage.fleet_summary().unwrap();
        assert_eq!(summary.total_equipment, 6);
        assert_eq!(summary.healthy, 4);
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.active_alerts, 1);
    }
}
