//! Error handling
//!
//! Nothing in the pipeline is fatal to the process: every failure here
//! degrades a single reading's processing, never availability for the
//! next reading.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures surfaced to the caller of `submit_reading`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or out-of-range reading, rejected before the detector.
    #[error("invalid reading: {0}")]
    Validation(String),

    /// Reading referenced an equipment id that is not registered.
    #[error("unknown equipment id {0}")]
    UnknownEquipment(i64),

    /// Storage collaborator failed; the affected broadcast is suppressed
    /// so viewers never see unsaved state.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

/// Storage collaborator failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Retrain failures. Never surfaced to callers: the previous model keeps
/// scoring and the result is flagged stale instead.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Retrain pass exceeded its deadline; retrain stays pending.
    #[error("retrain budget exceeded after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Window contained non-finite values or was otherwise unusable.
    #[error("degenerate training window: {0}")]
    Degenerate(String),
}
