//! Task model.
//!
//! A task is bound to exactly one scheduling mode. The mode is a tagged enum,
//! so a time block always carries both ends and a duration task always carries
//! its length; there is no way to populate the fields of two modes at once.
//!
//! Timer state transitions are owned by [`crate::timer::CountdownEngine`]:
//!
//! ```text
//! NotStarted ──> Running ──> Finished
//!                 ^   |
//!          resume |   | pause (duration only)
//!                 |   v
//!                 Paused
//! ```

pub mod context;
pub mod weekday;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use context::TaskContext;
pub use weekday::WeekdaySet;

/// Unique, stable task identifier.
pub type TaskId = String;

/// Identifier of a [`TaskContext`].
pub type ContextId = String;

/// User-assigned importance.
///
/// Declaration order is ranking order: `High` sorts first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// 0 for High, 1 for Medium, 2 for Low.
    pub fn ordinal(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(ValidationError::value(
                "priority",
                format!("'{other}' is not one of high, medium, low"),
            )),
        }
    }
}

/// How a task is bound to time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Scheduling {
    /// No time binding.
    None,
    /// Fixed wall-clock block.
    TimeBlock {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Floating duration, started explicitly.
    Duration { total_minutes: u32 },
}

impl Default for Scheduling {
    fn default() -> Self {
        Scheduling::None
    }
}

impl Scheduling {
    pub fn is_timed(&self) -> bool {
        !matches!(self, Scheduling::None)
    }

    /// `(start, end)` for time blocks.
    pub fn block(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match *self {
            Scheduling::TimeBlock { start, end } => Some((start, end)),
            _ => None,
        }
    }

    /// Full countdown length in seconds.
    pub fn total_seconds(&self) -> Option<u64> {
        match *self {
            Scheduling::None => None,
            Scheduling::TimeBlock { start, end } => {
                Some((end - start).num_seconds().max(0) as u64)
            }
            Scheduling::Duration { total_minutes } => Some(u64::from(total_minutes) * 60),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Scheduling::None => "none",
            Scheduling::TimeBlock { .. } => "time_block",
            Scheduling::Duration { .. } => "duration",
        }
    }
}

/// Countdown state of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    NotStarted,
    Running,
    Paused,
    Finished,
}

impl Default for TimerState {
    fn default() -> Self {
        TimerState::NotStarted
    }
}

/// A unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    /// Owning context (weak reference, no cascade)
    pub context_id: ContextId,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub scheduling: Scheduling,
    /// Countdown remaining, recomputed from timestamps while running
    #[serde(default)]
    pub remaining_seconds: u64,
    #[serde(default)]
    pub timer_state: TimerState,
    /// When the countdown first entered Running
    pub timer_started_at: Option<DateTime<Utc>>,
    /// Set while Paused
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    /// Cumulative paused time, excluded from elapsed
    #[serde(default)]
    pub paused_total_secs: u64,
    /// Set on the head of the last selection
    #[serde(default)]
    pub is_current_priority: bool,
    /// Set iff the task is complete
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_reflection: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    /// Weekdays a recurring template repeats on; `None` for plain tasks
    #[serde(default)]
    pub recurrence: Option<WeekdaySet>,
    /// Template this task was materialised from
    #[serde(default)]
    pub template_id: Option<TaskId>,
    /// Local date of the materialised occurrence
    #[serde(default)]
    pub occurrence_date: Option<NaiveDate>,
    /// Soft-removed from the active pool
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped by the store on every write
    #[serde(default)]
    pub version: u64,
}

impl Task {
    /// Create an untimed, incomplete task.
    pub fn new(
        title: impl Into<String>,
        context_id: impl Into<ContextId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Task {
            id: new_task_id(),
            title: title.into(),
            description: None,
            context_id: context_id.into(),
            priority: Priority::Medium,
            scheduling: Scheduling::None,
            remaining_seconds: 0,
            timer_state: TimerState::NotStarted,
            timer_started_at: None,
            paused_at: None,
            paused_total_secs: 0,
            is_current_priority: false,
            completed_at: None,
            completion_reflection: None,
            due_at: None,
            recurrence: None,
            template_id: None,
            occurrence_date: None,
            archived: false,
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_time_block(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.with_scheduling(Scheduling::TimeBlock { start, end })
    }

    pub fn with_duration(self, total_minutes: u32) -> Self {
        self.with_scheduling(Scheduling::Duration { total_minutes })
    }

    pub fn with_scheduling(mut self, scheduling: Scheduling) -> Self {
        self.scheduling = scheduling;
        self.reset_timer();
        self
    }

    pub fn with_due(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_recurrence(mut self, days: WeekdaySet) -> Self {
        self.recurrence = Some(days);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Incomplete and not archived.
    pub fn is_open(&self) -> bool {
        !self.is_complete() && !self.archived
    }

    /// Put the countdown back to its initial state for the current scheduling.
    pub fn reset_timer(&mut self) {
        self.timer_state = TimerState::NotStarted;
        self.remaining_seconds = self.scheduling.total_seconds().unwrap_or(0);
        self.timer_started_at = None;
        self.paused_at = None;
        self.paused_total_secs = 0;
    }

    /// Check the invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::value("id", "must not be empty"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::value("title", "must not be empty"));
        }
        if self.context_id.trim().is_empty() {
            return Err(ValidationError::value("context_id", "must not be empty"));
        }

        match self.scheduling {
            Scheduling::TimeBlock { start, end } if end <= start => {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
            Scheduling::Duration { total_minutes: 0 } => {
                return Err(ValidationError::value(
                    "total_minutes",
                    "duration must be at least one minute",
                ));
            }
            _ => {}
        }

        if let Some(total) = self.scheduling.total_seconds() {
            if self.remaining_seconds > total {
                return Err(ValidationError::value(
                    "remaining_seconds",
                    format!("{} exceeds the full length {}", self.remaining_seconds, total),
                ));
            }
        } else if self.timer_state != TimerState::NotStarted {
            return Err(ValidationError::value(
                "timer_state",
                "untimed tasks cannot run a countdown",
            ));
        }

        match self.timer_state {
            TimerState::Running | TimerState::Paused if self.timer_started_at.is_none() => {
                return Err(ValidationError::value(
                    "timer_started_at",
                    "must be set once the countdown has started",
                ));
            }
            TimerState::Paused if self.paused_at.is_none() => {
                return Err(ValidationError::value("paused_at", "must be set while paused"));
            }
            _ => {}
        }

        if let Some(days) = self.recurrence {
            if days.is_empty() {
                return Err(ValidationError::value(
                    "recurrence",
                    "recurring tasks need at least one weekday",
                ));
            }
        }

        if self.completed_at.is_none() && self.completion_reflection.is_some() {
            return Err(ValidationError::value(
                "completion_reflection",
                "only complete tasks carry a reflection",
            ));
        }

        Ok(())
    }
}

/// Fresh v4 task id.
pub fn new_task_id() -> TaskId {
    format!("task-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn task_creation_defaults() {
        let task = Task::new("Write report", "work", at(8, 0));
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.scheduling, Scheduling::None);
        assert_eq!(task.timer_state, TimerState::NotStarted);
        assert!(!task.is_complete());
        assert!(task.is_open());
        assert!(task.id.starts_with("task-"));
        assert!(task.validate().is_ok());
    }

    #[test]
    fn remaining_defaults_from_scheduling() {
        let block = Task::new("Standup", "work", at(8, 0)).with_time_block(at(9, 0), at(10, 0));
        assert_eq!(block.remaining_seconds, 3600);

        let timed = Task::new("Run", "health", at(8, 0)).with_duration(25);
        assert_eq!(timed.remaining_seconds, 25 * 60);
    }

    #[test]
    fn inverted_block_is_rejected() {
        let task = Task::new("Backwards", "work", at(8, 0)).with_time_block(at(10, 0), at(9, 0));
        assert!(matches!(
            task.validate(),
            Err(ValidationError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let task = Task::new("Nothing", "work", at(8, 0)).with_duration(0);
        assert!(task.validate().is_err());
    }

    #[test]
    fn running_without_start_time_is_rejected() {
        let mut task = Task::new("Run", "health", at(8, 0)).with_duration(10);
        task.timer_state = TimerState::Running;
        assert!(task.validate().is_err());
        task.timer_started_at = Some(at(8, 1));
        assert!(task.validate().is_ok());
    }

    #[test]
    fn untimed_task_cannot_run() {
        let mut task = Task::new("Inbox", "work", at(8, 0));
        task.timer_state = TimerState::Running;
        task.timer_started_at = Some(at(8, 0));
        assert!(task.validate().is_err());
    }

    #[test]
    fn empty_recurrence_is_rejected() {
        let task = Task::new("Gym", "health", at(8, 0)).with_recurrence(WeekdaySet::empty());
        assert!(task.validate().is_err());
    }

    #[test]
    fn priority_parses_and_orders() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("m".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
        assert_eq!(Priority::Low.ordinal(), 2);
    }

    #[test]
    fn scheduling_serializes_with_mode_tag() {
        let task = Task::new("Deep work", "work", at(8, 0))
            .with_time_block(at(9, 0), at(9, 0) + Duration::minutes(90));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["scheduling"]["mode"], "time_block");

        let decoded: Task = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, task);
    }
}
