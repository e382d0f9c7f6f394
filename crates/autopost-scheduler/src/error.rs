//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Slot time string could not be parsed or is out of range.
    #[error("invalid slot time: {0}")]
    InvalidSlotTime(String),

    /// Two jobs share the same local fire time.
    #[error("duplicate slot time {slot} shared by jobs '{first}' and '{second}'")]
    DuplicateSlot {
        slot: String,
        first: String,
        second: String,
    },

    /// Two jobs share the same identifier.
    #[error("duplicate job id: {0}")]
    DuplicateJobId(String),

    /// Job table contains no jobs.
    #[error("job table is empty")]
    EmptyJobTable,

    /// Job table file could not be parsed.
    #[error("invalid job table: {0}")]
    InvalidJobTable(String),

    /// State file I/O error.
    #[error("state file error: {0}")]
    StateIo(#[from] std::io::Error),

    /// State serialization error.
    #[error("state serialization error: {0}")]
    StateSerde(#[from] serde_json::Error),
}
