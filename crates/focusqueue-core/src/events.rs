use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reminder::{CapabilityGap, Tier};
use crate::task::{TaskId, TimerState};

/// Every engine state change produces an Event.
/// Runtimes forward them to observers; the CLI prints them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CountdownStarted {
        task_id: TaskId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    CountdownPaused {
        task_id: TaskId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    CountdownResumed {
        task_id: TaskId,
        remaining_secs: u64,
        /// Length of the pause that just ended.
        paused_secs: u64,
        at: DateTime<Utc>,
    },
    CountdownFinished {
        task_id: TaskId,
        reason: FinishReason,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: TaskId,
        previous_state: TimerState,
        /// How completion ended a live countdown; `None` when none was live.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        countdown: Option<FinishReason>,
        at: DateTime<Utc>,
    },
    /// The wall clock moved backwards while a countdown was running.
    ClockRewound {
        task_id: TaskId,
        kept_remaining_secs: u64,
        at: DateTime<Utc>,
    },
    RemindersScheduled {
        task_id: TaskId,
        tiers: Vec<Tier>,
        gaps: Vec<CapabilityGap>,
        at: DateTime<Utc>,
    },
    RemindersCancelled {
        task_id: TaskId,
        at: DateTime<Utc>,
    },
}

/// Why a countdown reached Finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Remaining time hit zero.
    Expired,
    /// The task was completed by the user.
    Completed,
}

impl Event {
    pub fn task_id(&self) -> &str {
        match self {
            Event::CountdownStarted { task_id, .. }
            | Event::CountdownPaused { task_id, .. }
            | Event::CountdownResumed { task_id, .. }
            | Event::CountdownFinished { task_id, .. }
            | Event::TaskCompleted { task_id, .. }
            | Event::ClockRewound { task_id, .. }
            | Event::RemindersScheduled { task_id, .. }
            | Event::RemindersCancelled { task_id, .. } => task_id,
        }
    }
}
