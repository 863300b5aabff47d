//! Core error types for focusqueue-core.
//!
//! This module defines the error hierarchy using thiserror. Engine
//! components return the narrow error for their concern; `CoreError`
//! wraps them at the storage and CLI boundaries.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::task::{TaskId, TimerState};

/// Core error type for focusqueue-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Task store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Countdown transition errors
    #[error("Countdown error: {0}")]
    Countdown(#[from] CountdownError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Task store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No task with this id exists
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// Insert with an id that is already taken
    #[error("Task already exists: {0}")]
    AlreadyExists(TaskId),

    /// Optimistic version check failed
    #[error("Version conflict for task {id}: expected {expected}, found {found}")]
    Conflict {
        id: TaskId,
        expected: u64,
        found: u64,
    },

    /// Retries exhausted while resolving conflicts
    #[error("Gave up updating task {id} after {attempts} attempts")]
    RetriesExhausted { id: TaskId, attempts: u32 },

    /// The store lock was poisoned by a panicking writer
    #[error("Task store is poisoned")]
    Poisoned,

    /// Rejected by validation before reaching the store
    #[error("Invalid task: {0}")]
    Invalid(#[from] ValidationError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Home/data directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Invalid date window for recurrence expansion
    #[error("Invalid date window: {from} is after {to}")]
    InvalidDateWindow { from: NaiveDate, to: NaiveDate },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Malformed "HH:mm" time of day
    #[error("Invalid time of day '{0}', expected HH:mm")]
    InvalidTimeOfDay(String),

    /// Weekday index outside 0..=6
    #[error("Invalid weekday index {0}, expected 0 (Sunday) to 6 (Saturday)")]
    InvalidWeekday(u8),
}

impl ValidationError {
    pub(crate) fn value(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Errors from countdown state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountdownError {
    /// Task has no time binding
    #[error("Task {0} has no time binding and cannot run a countdown")]
    Untimed(TaskId),

    /// Transition not allowed from the current state
    #[error("Invalid countdown transition for task {id}: {from:?} cannot {action}")]
    InvalidTransition {
        id: TaskId,
        from: TimerState,
        action: &'static str,
    },

    /// Time blocks follow the wall clock and cannot be paused
    #[error("Task {0} is a time block; its end is fixed and it cannot be paused")]
    CannotPause(TaskId),

    /// Time blocks start on their own at the start time
    #[error("Task {id} is a time block that starts at {start}")]
    NotYetStarted { id: TaskId, start: DateTime<Utc> },

    /// Task already completed
    #[error("Task {0} is already complete")]
    AlreadyComplete(TaskId),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
