//! Countdown engine.
//!
//! A wall-clock-based state machine over the timer fields of a [`Task`]. It
//! does not use internal threads; the caller invokes `tick()` periodically
//! (see [`crate::runtime::CountdownTicker`]).
//!
//! ## State Transitions
//!
//! ```text
//! NotStarted -> Running -> (Paused <-> Running) -> Finished
//! ```
//!
//! Remaining time is always recomputed from absolute timestamps:
//!
//! - time block: `end - now`
//! - duration:   `total - (now - timer_started_at - paused_total)`
//!
//! so a suspended process catches up on the next tick instead of drifting.
//! While running, remaining never increases (a clock moved backwards keeps
//! the previous value) and never drops below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CountdownError;
use crate::events::{Event, FinishReason};
use crate::task::{Scheduling, Task, TaskId, TimerState};

/// Read-only view of a countdown at an instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountdownSnapshot {
    pub task_id: TaskId,
    pub state: TimerState,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub at: DateTime<Utc>,
}

impl CountdownSnapshot {
    /// 0.0 .. 1.0 progress through the countdown.
    pub fn progress(&self) -> f64 {
        if self.total_secs == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_secs as f64 / self.total_secs as f64)
    }
}

/// Drives timer transitions for timed tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountdownEngine;

impl CountdownEngine {
    pub fn new() -> Self {
        Self
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// What `tick(now)` would report, without mutating the task.
    pub fn project(&self, task: &Task, now: DateTime<Utc>) -> CountdownSnapshot {
        let mut copy = task.clone();
        self.tick(&mut copy, now);
        CountdownSnapshot {
            task_id: copy.id,
            state: copy.timer_state,
            remaining_secs: copy.remaining_seconds,
            total_secs: task.scheduling.total_seconds().unwrap_or(0),
            at: now,
        }
    }

    /// Instant the countdown is projected to reach zero.
    ///
    /// `None` unless the countdown is running (or a time block that has not
    /// started yet, whose end is fixed).
    pub fn expected_end(&self, task: &Task, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match (task.scheduling, task.timer_state) {
            (Scheduling::TimeBlock { end, .. }, TimerState::NotStarted | TimerState::Running) => {
                Some(end)
            }
            (Scheduling::Duration { .. }, TimerState::Running) => {
                let snap = self.project(task, now);
                Some(now + chrono::Duration::seconds(snap.remaining_secs as i64))
            }
            _ => None,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a countdown.
    ///
    /// Duration tasks start on demand. Time blocks start on their own once
    /// their start time has passed; an explicit start before then is refused.
    ///
    /// # Errors
    ///
    /// Fails for untimed or complete tasks, early time blocks, and tasks
    /// whose countdown already left `NotStarted`.
    pub fn start(&self, task: &mut Task, now: DateTime<Utc>) -> Result<Event, CountdownError> {
        self.ensure_actionable(task)?;
        if task.timer_state != TimerState::NotStarted {
            return Err(invalid(task, "start"));
        }

        match task.scheduling {
            Scheduling::None => Err(CountdownError::Untimed(task.id.clone())),
            Scheduling::TimeBlock { start, .. } => {
                if now < start {
                    return Err(CountdownError::NotYetStarted {
                        id: task.id.clone(),
                        start,
                    });
                }
                Ok(self.tick(task, now).unwrap_or_else(|| Event::CountdownStarted {
                    task_id: task.id.clone(),
                    remaining_secs: task.remaining_seconds,
                    at: now,
                }))
            }
            Scheduling::Duration { total_minutes } => {
                task.timer_state = TimerState::Running;
                task.timer_started_at = Some(now);
                task.paused_at = None;
                task.paused_total_secs = 0;
                task.remaining_seconds = u64::from(total_minutes) * 60;
                task.updated_at = now;
                debug!(task = %task.id, remaining = task.remaining_seconds, "countdown started");
                Ok(Event::CountdownStarted {
                    task_id: task.id.clone(),
                    remaining_secs: task.remaining_seconds,
                    at: now,
                })
            }
        }
    }

    /// Pause a running duration countdown.
    ///
    /// # Errors
    ///
    /// Time blocks cannot be paused; other tasks must be running.
    pub fn pause(&self, task: &mut Task, now: DateTime<Utc>) -> Result<Event, CountdownError> {
        self.ensure_actionable(task)?;
        if matches!(task.scheduling, Scheduling::TimeBlock { .. }) {
            return Err(CountdownError::CannotPause(task.id.clone()));
        }
        if task.timer_state != TimerState::Running {
            return Err(invalid(task, "pause"));
        }

        // Flush elapsed time first.
        self.tick(task, now);
        if task.timer_state != TimerState::Running {
            return Err(invalid(task, "pause"));
        }

        task.timer_state = TimerState::Paused;
        task.paused_at = Some(now);
        task.updated_at = now;
        debug!(task = %task.id, remaining = task.remaining_seconds, "countdown paused");
        Ok(Event::CountdownPaused {
            task_id: task.id.clone(),
            remaining_secs: task.remaining_seconds,
            at: now,
        })
    }

    /// Resume a paused countdown. The paused interval is excluded from
    /// elapsed time.
    ///
    /// # Errors
    ///
    /// The task must be paused.
    pub fn resume(&self, task: &mut Task, now: DateTime<Utc>) -> Result<Event, CountdownError> {
        self.ensure_actionable(task)?;
        if task.timer_state != TimerState::Paused {
            return Err(invalid(task, "resume"));
        }

        let paused_secs = task
            .paused_at
            .map(|p| (now - p).num_seconds().max(0) as u64)
            .unwrap_or(0);
        task.paused_total_secs = task.paused_total_secs.saturating_add(paused_secs);
        task.paused_at = None;
        task.timer_state = TimerState::Running;
        task.updated_at = now;
        debug!(task = %task.id, paused_secs, "countdown resumed");
        Ok(Event::CountdownResumed {
            task_id: task.id.clone(),
            remaining_secs: task.remaining_seconds,
            paused_secs,
            at: now,
        })
    }

    /// Mark the task complete and stop any countdown.
    ///
    /// # Errors
    ///
    /// Fails if the task is already complete.
    pub fn complete(
        &self,
        task: &mut Task,
        now: DateTime<Utc>,
        reflection: Option<String>,
    ) -> Result<Event, CountdownError> {
        if task.is_complete() {
            return Err(CountdownError::AlreadyComplete(task.id.clone()));
        }

        let previous_state = task.timer_state;
        let mut countdown = None;
        if task.timer_state == TimerState::Running {
            if let Some(Event::CountdownFinished { reason, .. }) = self.tick(task, now) {
                countdown = Some(reason);
            }
        }
        if matches!(task.timer_state, TimerState::Running | TimerState::Paused) {
            countdown = Some(FinishReason::Completed);
        }
        if task.scheduling.is_timed() {
            task.timer_state = TimerState::Finished;
        }
        task.paused_at = None;
        task.completed_at = Some(now);
        task.completion_reflection = reflection.filter(|r| !r.trim().is_empty());
        task.is_current_priority = false;
        task.updated_at = now;
        debug!(task = %task.id, ?previous_state, "task completed");
        Ok(Event::TaskCompleted {
            task_id: task.id.clone(),
            previous_state,
            countdown,
            at: now,
        })
    }

    /// Reconcile the countdown with the wall clock.
    ///
    /// Starts due time blocks, recomputes remaining time for running
    /// countdowns, and finishes them at zero. Returns the most significant
    /// event, if anything changed state.
    pub fn tick(&self, task: &mut Task, now: DateTime<Utc>) -> Option<Event> {
        if task.is_complete() {
            return None;
        }

        let mut started = None;
        if task.timer_state == TimerState::NotStarted {
            match task.scheduling {
                Scheduling::TimeBlock { start, .. } if now >= start => {
                    task.timer_state = TimerState::Running;
                    task.timer_started_at = Some(now);
                    task.updated_at = now;
                    started = Some(now);
                }
                _ => return None,
            }
        }

        if task.timer_state != TimerState::Running {
            return None;
        }

        let computed = computed_remaining(task, now);
        let previous = task.remaining_seconds;
        let mut rewound = None;
        let next = if computed > previous as i64 {
            if started.is_none() {
                warn!(
                    task = %task.id,
                    computed,
                    kept = previous,
                    "clock moved backwards, keeping remaining time"
                );
                rewound = Some(previous);
            }
            previous
        } else {
            computed.max(0) as u64
        };
        task.remaining_seconds = next;

        if next == 0 {
            task.timer_state = TimerState::Finished;
            task.updated_at = now;
            debug!(task = %task.id, "countdown expired");
            return Some(Event::CountdownFinished {
                task_id: task.id.clone(),
                reason: FinishReason::Expired,
                at: now,
            });
        }

        if started.is_some() {
            debug!(task = %task.id, remaining = next, "time block started");
            return Some(Event::CountdownStarted {
                task_id: task.id.clone(),
                remaining_secs: next,
                at: now,
            });
        }

        rewound.map(|kept| Event::ClockRewound {
            task_id: task.id.clone(),
            kept_remaining_secs: kept,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ensure_actionable(&self, task: &Task) -> Result<(), CountdownError> {
        if task.is_complete() {
            return Err(CountdownError::AlreadyComplete(task.id.clone()));
        }
        if !task.scheduling.is_timed() {
            return Err(CountdownError::Untimed(task.id.clone()));
        }
        Ok(())
    }
}

/// Remaining seconds derived from timestamps; may be negative past the end.
fn computed_remaining(task: &Task, now: DateTime<Utc>) -> i64 {
    match task.scheduling {
        Scheduling::None => 0,
        Scheduling::TimeBlock { end, .. } => (end - now).num_seconds(),
        Scheduling::Duration { total_minutes } => {
            let total = i64::from(total_minutes) * 60;
            let Some(started) = task.timer_started_at else {
                return total;
            };
            let until = task.paused_at.unwrap_or(now);
            let elapsed = (until - started).num_seconds() - task.paused_total_secs as i64;
            total - elapsed.max(0)
        }
    }
}

fn invalid(task: &Task, action: &'static str) -> CountdownError {
    CountdownError::InvalidTransition {
        id: task.id.clone(),
        from: task.timer_state,
        action,
    }
}
