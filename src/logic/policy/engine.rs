//! Alert Policy
//!
//! Maps detector output and current equipment state into a severity
//! decision plus the records that decision requires. Pure and
//! deterministic: no storage, no broadcasting, no clock reads beyond the
//! reading's own timestamp.

use chrono::Duration;

use crate::constants;
use crate::logic::detector::Detection;
use crate::logic::types::{
    Alert, Classification, Equipment, EquipmentStatus, MaintenanceTask, Prediction,
    SensorReading, Severity, TaskPriority,
};

use super::recommend;

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Anomaly confidence that raises a warning alert.
    pub warning_confidence: f64,
    /// Anomaly confidence that raises a critical alert and a task.
    pub critical_confidence: f64,
    /// Days ahead the generated maintenance task is scheduled.
    pub task_lead_days: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            warning_confidence: constants::DEFAULT_WARNING_CONFIDENCE,
            critical_confidence: constants::DEFAULT_CRITICAL_CONFIDENCE,
            task_lead_days: constants::DEFAULT_TASK_LEAD_DAYS,
        }
    }
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        Self {
            warning_confidence: constants::get_warning_confidence(),
            critical_confidence: constants::get_critical_confidence(),
            ..Default::default()
        }
    }
}

/// Everything the coordinator must persist and broadcast for one reading.
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    /// Status the equipment should now carry. Equal to the current
    /// status when the reading changes nothing.
    pub new_status: EquipmentStatus,
    pub severity: Option<Severity>,
    pub prediction: Option<Prediction>,
    pub alert: Option<Alert>,
    pub task: Option<MaintenanceTask>,
}

pub struct AlertPolicy {
    config: PolicyConfig,
}

impl AlertPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Evaluate one scored reading.
    pub fn evaluate(
        &self,
        equipment: &Equipment,
        reading: &SensorReading,
        detection: &Detection,
    ) -> PolicyDecision {
        if detection.classification == Classification::Normal {
            return PolicyDecision {
                new_status: EquipmentStatus::Healthy,
                severity: None,
                prediction: None,
                alert: None,
                task: None,
            };
        }

        let severity = if detection.confidence >= self.config.critical_confidence {
            Some(Severity::Critical)
        } else if detection.confidence >= self.config.warning_confidence {
            Some(Severity::Warning)
        } else {
            // Monitoring noise: record the prediction, raise nothing,
            // leave the status alone.
            None
        };

        let recommendation =
            recommend::generate(&reading.channels, &detection.deviations, severity);

        let prediction = Prediction {
            equipment_id: equipment.id,
            timestamp: reading.timestamp,
            classification: Classification::Anomalous,
            confidence: detection.confidence,
            predicted_failure: Prediction::failure_horizon(reading.timestamp, detection.confidence),
            recommendation: recommendation.clone(),
        };

        let Some(severity) = severity else {
            return PolicyDecision {
                new_status: equipment.status,
                severity: None,
                prediction: Some(prediction),
                alert: None,
                task: None,
            };
        };

        let alert = Alert::new(
            equipment.id,
            reading.timestamp,
            severity,
            format!("{} - Anomaly Detected", equipment.name),
            format!("AI detected unusual operating patterns. {recommendation}"),
        );

        let task = match severity {
            Severity::Critical => Some(MaintenanceTask::new(
                equipment.id,
                format!("Inspect {}: {recommendation}", equipment.name),
                reading.timestamp + Duration::days(self.config.task_lead_days),
                TaskPriority::High,
            )),
            Severity::Warning => None,
        };

        PolicyDecision {
            new_status: severity.as_status(),
            severity: Some(severity),
            prediction: Some(prediction),
            alert: Some(alert),
            task,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
