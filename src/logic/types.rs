//! Core domain records shared across the pipeline.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::channels::ChannelValues;

// ============================================================================
// EQUIPMENT
// ============================================================================

/// Derived health state of one equipment unit.
/// Mutated only by the alert policy after a reading is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Healthy,
    Warning,
    Critical,
}

impl EquipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EquipmentStatus::Healthy => "healthy",
            EquipmentStatus::Warning => "warning",
            EquipmentStatus::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<EquipmentStatus> {
        match s {
            "healthy" => Some(EquipmentStatus::Healthy),
            "warning" => Some(EquipmentStatus::Warning),
            "critical" => Some(EquipmentStatus::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub location: Option<String>,
    pub status: EquipmentStatus,
}

// ============================================================================
// READINGS
// ============================================================================

/// One timestamped multi-channel sample for one equipment unit.
/// Append-only: never mutated once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub equipment_id: i64,
    pub timestamp: DateTime<Utc>,
    pub channels: ChannelValues,
}

impl SensorReading {
    pub fn new(equipment_id: i64, channels: ChannelValues) -> Self {
        Self {
            equipment_id,
            timestamp: Utc::now(),
            channels,
        }
    }
}

// ============================================================================
// DETECTION OUTPUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Normal,
    Anomalous,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Normal => "normal",
            Classification::Anomalous => "anomalous",
        }
    }

    pub fn is_anomalous(self) -> bool {
        self == Classification::Anomalous
    }
}

/// Scored interpretation of one reading.
/// Created once per anomalous reading, persisted, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub equipment_id: i64,
    pub timestamp: DateTime<Utc>,
    pub classification: Classification,
    /// 0-100, monotonically increasing with "more anomalous".
    pub confidence: f64,
    pub predicted_failure: DateTime<Utc>,
    pub recommendation: String,
}

impl Prediction {
    /// Failure horizon shrinks as confidence grows: 100 -> 1 day out,
    /// at the warning threshold roughly 5 days out.
    pub fn failure_horizon(timestamp: DateTime<Utc>, confidence: f64) -> DateTime<Utc> {
        let days = (7.0 - confidence / 100.0 * 6.0).clamp(1.0, 7.0);
        timestamp + Duration::hours((days * 24.0) as i64)
    }
}

// ============================================================================
// ALERTS
// ============================================================================

/// Alert urgency tier, derived from confidence thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
        }
    }

    pub fn parse(s: &str) -> Option<Severity> {
        match s {
            "critical" => Some(Severity::Critical),
            "warning" => Some(Severity::Warning),
            _ => None,
        }
    }

    /// Equipment status implied by an alert of this severity.
    pub fn as_status(self) -> EquipmentStatus {
        match self {
            Severity::Critical => EquipmentStatus::Critical,
            Severity::Warning => EquipmentStatus::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub equipment_id: i64,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(
        equipment_id: i64,
        timestamp: DateTime<Utc>,
        severity: Severity,
        title: String,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            equipment_id,
            timestamp,
            severity,
            title,
            description,
            acknowledged: false,
        }
    }
}

// ============================================================================
// MAINTENANCE TASKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<TaskPriority> {
        match s {
            "high" => Some(TaskPriority::High),
            "medium" => Some(TaskPriority::Medium),
            "low" => Some(TaskPriority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// Scheduled maintenance work. Status transitions are owned by the
/// scheduling collaborator, never by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: Uuid,
    pub equipment_id: i64,
    pub task: String,
    pub scheduled_date: DateTime<Utc>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl MaintenanceTask {
    pub fn new(
        equipment_id: i64,
        task: String,
        scheduled_date: DateTime<Utc>,
        priority: TaskPriority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            equipment_id,
            task,
            scheduled_date,
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
