//! Trigger planning and the per-task ledger.
//!
//! ## Planning
//!
//! | Tier             | Time block          | Running duration            |
//! |------------------|---------------------|-----------------------------|
//! | PreBlockWarning  | start - lead        | -                           |
//! | CriticalDecision | start               | -                           |
//! | MidBlockWarning  | midpoint            | start + fraction * total    |
//! | NearEndAlert     | end - window        | expiry - window             |
//! | Overdue          | min(end, due)       | min(expiry, due)            |
//!
//! Untimed tasks and paused or unstarted duration tasks only get the due-time
//! Overdue. Triggers already in the past are dropped, except Overdue which
//! fires immediately.
//!
//! ## Ledger
//!
//! Each reschedule cancels everything registered for the task before the new
//! set goes out. The ledger remembers which tiers already fired for the
//! task's current scheduling inputs, so calling `schedule_for` again on an
//! unchanged task never repeats a delivered tier. Editing the scheduling
//! inputs starts a new cycle.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AlarmRegistrar, AlertEffects, CapabilityGap, RegistrationError, Tier, Trigger, TriggerPayload};
use crate::events::Event;
use crate::task::{Scheduling, Task, TaskId, TimerState};

/// Reminder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Lead time of the pre-block warning
    #[serde(default = "default_pre_block_lead")]
    pub pre_block_lead_minutes: u32,
    /// How long before the end the near-end alert fires
    #[serde(default = "default_near_end_window")]
    pub near_end_window_minutes: u32,
    /// Fraction of a duration countdown at which the nudge fires
    #[serde(default = "default_mid_fraction")]
    pub mid_fraction: f64,
    /// Mid-block nudges on/off
    #[serde(default = "default_true")]
    pub nudges_enabled: bool,
    #[serde(default = "default_true")]
    pub vibration: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
}

fn default_pre_block_lead() -> u32 {
    10
}
fn default_near_end_window() -> u32 {
    5
}
fn default_mid_fraction() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            pre_block_lead_minutes: default_pre_block_lead(),
            near_end_window_minutes: default_near_end_window(),
            mid_fraction: default_mid_fraction(),
            nudges_enabled: true,
            vibration: true,
            sound: true,
        }
    }
}

impl ReminderConfig {
    fn effects(&self, tier: Tier) -> AlertEffects {
        let base = tier.base_effects();
        AlertEffects {
            vibrate: base.vibrate && self.vibration,
            sound: base.sound && self.sound,
            ..base
        }
    }

    fn fraction(&self) -> f64 {
        if self.mid_fraction.is_finite() {
            self.mid_fraction.clamp(0.0, 1.0)
        } else {
            default_mid_fraction()
        }
    }
}

/// What one `schedule_for` call did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub task_id: TaskId,
    /// Triggers the registrar accepted, in firing order
    pub triggers: Vec<Trigger>,
    /// Tiers the registrar refused
    pub gaps: Vec<CapabilityGap>,
}

impl ScheduleReport {
    pub fn tiers(&self) -> Vec<Tier> {
        self.triggers.iter().map(|t| t.tier).collect()
    }

    pub fn to_event(&self, at: DateTime<Utc>) -> Event {
        Event::RemindersScheduled {
            task_id: self.task_id.clone(),
            tiers: self.tiers(),
            gaps: self.gaps.clone(),
            at,
        }
    }
}

/// Inputs that define a scheduling cycle.
///
/// Timer progress is absent: a block starting on its own, or a duration
/// countdown pausing and resuming, moves trigger times but keeps the tiers
/// already delivered. Only a fresh start of a duration countdown counts.
#[derive(Debug, Clone, PartialEq)]
struct Fingerprint {
    scheduling: Scheduling,
    due_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
}

impl Fingerprint {
    fn of(task: &Task) -> Self {
        let started_at = match task.scheduling {
            Scheduling::Duration { .. } => task.timer_started_at,
            _ => None,
        };
        Self {
            scheduling: task.scheduling,
            due_at: task.due_at,
            started_at,
        }
    }
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    fingerprint: Fingerprint,
    registered: Vec<Trigger>,
    fired: BTreeSet<Tier>,
}

impl LedgerEntry {
    /// Tiers delivered by `now`: fired earlier, or registered for a time
    /// that has passed.
    fn delivered(&self, now: DateTime<Utc>) -> BTreeSet<Tier> {
        let mut fired = self.fired.clone();
        fired.extend(
            self.registered
                .iter()
                .filter(|t| t.fires_at <= now)
                .map(|t| t.tier),
        );
        fired
    }
}

/// Computes and registers reminder triggers.
#[derive(Debug, Clone, Default)]
pub struct ReminderScheduler {
    config: ReminderConfig,
    ledger: HashMap<TaskId, LedgerEntry>,
    gaps: Vec<CapabilityGap>,
}

impl ReminderScheduler {
    pub fn new(config: ReminderConfig) -> Self {
        Self {
            config,
            ledger: HashMap::new(),
            gaps: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Capability gaps recorded since the last [`take_gaps`](Self::take_gaps).
    pub fn gaps(&self) -> &[CapabilityGap] {
        &self.gaps
    }

    /// Drain the recorded capability gaps.
    pub fn take_gaps(&mut self) -> Vec<CapabilityGap> {
        std::mem::take(&mut self.gaps)
    }

    /// Triggers for the task as of `now`, ignoring the ledger.
    ///
    /// Sorted by firing time, then tier.
    pub fn plan(&self, task: &Task, now: DateTime<Utc>) -> Vec<Trigger> {
        if !task.is_open() || task.is_recurring() {
            return Vec::new();
        }

        let lead = Duration::minutes(i64::from(self.config.pre_block_lead_minutes));
        let window = Duration::minutes(i64::from(self.config.near_end_window_minutes));
        let mut planned: Vec<(Tier, DateTime<Utc>)> = Vec::new();

        let end_boundary = match (task.scheduling, task.timer_state) {
            (Scheduling::TimeBlock { start, end }, _) => {
                planned.push((Tier::PreBlockWarning, start - lead));
                planned.push((Tier::CriticalDecision, start));
                planned.push((Tier::MidBlockWarning, start + (end - start) / 2));
                let near_end = end - window;
                if near_end > start {
                    planned.push((Tier::NearEndAlert, near_end));
                }
                Some(end)
            }
            (
                Scheduling::Duration { total_minutes },
                TimerState::Running | TimerState::Finished,
            ) => task.timer_started_at.map(|started| {
                let total = Duration::minutes(i64::from(total_minutes));
                let origin = started + Duration::seconds(task.paused_total_secs as i64);
                let mid_secs = (total.num_seconds() as f64 * self.config.fraction()).round() as i64;
                planned.push((Tier::MidBlockWarning, origin + Duration::seconds(mid_secs)));
                let expiry = origin + total;
                let near_end = expiry - window;
                if near_end > origin {
                    planned.push((Tier::NearEndAlert, near_end));
                }
                expiry
            }),
            _ => None,
        };

        let overdue_at = match (end_boundary, task.due_at) {
            (Some(end), Some(due)) => Some(end.min(due)),
            (end, due) => end.or(due),
        };
        if let Some(at) = overdue_at {
            planned.push((Tier::Overdue, at));
        }

        let mut triggers: Vec<Trigger> = planned
            .into_iter()
            .filter(|(tier, _)| *tier != Tier::MidBlockWarning || self.config.nudges_enabled)
            .filter_map(|(tier, at)| match tier {
                Tier::Overdue => Some((tier, at.max(now))),
                _ if at < now => None,
                _ => Some((tier, at)),
            })
            .map(|(tier, fires_at)| Trigger {
                task_id: task.id.clone(),
                tier,
                fires_at,
                payload: TriggerPayload {
                    title: task.title.clone(),
                    effects: self.config.effects(tier),
                },
            })
            .collect();
        triggers.sort_by(|a, b| a.fires_at.cmp(&b.fires_at).then(a.tier.cmp(&b.tier)));
        triggers
    }

    /// First half of a reschedule: decide what to register.
    ///
    /// Drops tiers already delivered in the current cycle and resets the
    /// ledger entry. Closed tasks lose their entry. Follow with registrar calls and [`commit`](Self::commit).
    pub fn prepare(&mut self, task: &Task, now: DateTime<Utc>) -> Vec<Trigger> {
        if !task.is_open() || task.is_recurring() {
            self.forget(&task.id);
            return Vec::new();
        }

        let fingerprint = Fingerprint::of(task);
        let fired = match self.ledger.get(&task.id) {
            Some(entry) if entry.fingerprint == fingerprint => entry.delivered(now),
            Some(_) => {
                debug!(task = %task.id, "scheduling inputs changed, new reminder cycle");
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        };

        let plan: Vec<Trigger> = self
            .plan(task, now)
            .into_iter()
            .filter(|t| !fired.contains(&t.tier))
            .collect();

        self.ledger.insert(
            task.id.clone(),
            LedgerEntry {
                fingerprint,
                registered: Vec::new(),
                fired,
            },
        );
        plan
    }

    /// Second half of a reschedule: record registrar outcomes.
    pub fn commit(
        &mut self,
        task_id: &str,
        outcomes: Vec<(Trigger, Result<(), RegistrationError>)>,
        now: DateTime<Utc>,
    ) -> ScheduleReport {
        let mut report = ScheduleReport {
            task_id: task_id.to_string(),
            ..ScheduleReport::default()
        };

        for (trigger, outcome) in outcomes {
            match outcome {
                Ok(()) => report.triggers.push(trigger),
                Err(error) => {
                    warn!(task = %task_id, tier = %trigger.tier, %error, "reminder tier unavailable");
                    report.gaps.push(CapabilityGap {
                        task_id: task_id.to_string(),
                        tier: trigger.tier,
                        error,
                    });
                }
            }
        }

        if let Some(entry) = self.ledger.get_mut(task_id) {
            entry.fired.extend(
                report
                    .triggers
                    .iter()
                    .filter(|t| t.fires_at <= now)
                    .map(|t| t.tier),
            );
            entry.registered = report.triggers.clone();
        }
        self.gaps.extend(report.gaps.iter().cloned());

        debug!(
            task = %task_id,
            registered = report.triggers.len(),
            gaps = report.gaps.len(),
            "reminders scheduled"
        );
        report
    }

    /// Cancel the task's previous triggers and register the current set.
    pub fn schedule_for(
        &mut self,
        task: &Task,
        now: DateTime<Utc>,
        registrar: &dyn AlarmRegistrar,
    ) -> ScheduleReport {
        let plan = self.prepare(task, now);
        registrar.cancel(&task.id);
        let outcomes = plan
            .into_iter()
            .map(|t| {
                let outcome = registrar.register(&t);
                (t, outcome)
            })
            .collect();
        self.commit(&task.id, outcomes, now)
    }

    /// Cancel everything for a task and forget its cycle.
    pub fn cancel(&mut self, task_id: &str, registrar: &dyn AlarmRegistrar) {
        registrar.cancel(task_id);
        self.forget(task_id);
    }

    /// Forget a task's cycle without touching the registrar.
    pub fn forget(&mut self, task_id: &str) {
        self.ledger.remove(task_id);
    }

    /// Triggers the registrar accepted in the task's current cycle.
    pub fn registered(&self, task_id: &str) -> &[Trigger] {
        self.ledger
            .get(task_id)
            .map(|e| e.registered.as_slice())
            .unwrap_or(&[])
    }
}
