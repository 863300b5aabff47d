//! Alarm registrar seam.

use std::collections::HashSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Tier, Trigger};
use crate::task::TaskId;

/// Why the platform refused a registration.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RegistrationError {
    /// Alarm or notification permission denied
    #[error("permission denied")]
    PermissionDenied,

    /// Hardware or service missing (no vibrator, no sound device)
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The registrar did not answer in time
    #[error("registration timed out after {0} ms")]
    Timeout(u64),

    /// Anything else the platform reported
    #[error("registration rejected: {0}")]
    Rejected(String),
}

/// A tier that could not be registered. Recorded, never retried on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGap {
    pub task_id: TaskId,
    pub tier: Tier,
    pub error: RegistrationError,
}

/// Platform alarm/notification registration.
///
/// Implementations should use wall-clock alarms that fire even while the
/// process is suspended, and must answer promptly; the async runtime wraps
/// calls in a timeout.
pub trait AlarmRegistrar: Send + Sync {
    /// Register one trigger.
    ///
    /// # Errors
    ///
    /// Returns why the platform refused it.
    fn register(&self, trigger: &Trigger) -> Result<(), RegistrationError>;

    /// Drop every trigger registered for the task.
    fn cancel(&self, task_id: &str);
}

impl<R: AlarmRegistrar + ?Sized> AlarmRegistrar for std::sync::Arc<R> {
    fn register(&self, trigger: &Trigger) -> Result<(), RegistrationError> {
        (**self).register(trigger)
    }

    fn cancel(&self, task_id: &str) {
        (**self).cancel(task_id)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    pending: Vec<Trigger>,
    history: Vec<Trigger>,
    cancels: Vec<TaskId>,
}

/// In-memory registrar that records everything.
///
/// `deny` makes registrations of a tier fail, to exercise degraded paths.
#[derive(Debug, Default)]
pub struct RecordingRegistrar {
    inner: Mutex<Recorded>,
    denied: Mutex<HashSet<Tier>>,
}

impl RecordingRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, tier: Tier) {
        lock(&self.denied).insert(tier);
    }

    /// Triggers currently registered (not cancelled).
    pub fn pending(&self) -> Vec<Trigger> {
        lock(&self.inner).pending.clone()
    }

    pub fn pending_for(&self, task_id: &str) -> Vec<Trigger> {
        lock(&self.inner)
            .pending
            .iter()
            .filter(|t| t.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Every successful registration, including cancelled ones.
    pub fn history(&self) -> Vec<Trigger> {
        lock(&self.inner).history.clone()
    }

    pub fn registrations_of(&self, task_id: &str, tier: Tier) -> usize {
        lock(&self.inner)
            .history
            .iter()
            .filter(|t| t.task_id == task_id && t.tier == tier)
            .count()
    }

    pub fn cancel_count(&self, task_id: &str) -> usize {
        lock(&self.inner).cancels.iter().filter(|id| *id == task_id).count()
    }
}

impl AlarmRegistrar for RecordingRegistrar {
    fn register(&self, trigger: &Trigger) -> Result<(), RegistrationError> {
        if lock(&self.denied).contains(&trigger.tier) {
            return Err(RegistrationError::PermissionDenied);
        }
        let mut inner = lock(&self.inner);
        inner.pending.push(trigger.clone());
        inner.history.push(trigger.clone());
        Ok(())
    }

    fn cancel(&self, task_id: &str) {
        let mut inner = lock(&self.inner);
        inner.pending.retain(|t| t.task_id != task_id);
        inner.cancels.push(task_id.to_string());
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
