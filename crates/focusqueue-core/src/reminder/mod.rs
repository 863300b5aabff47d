//! Tiered reminders.
//!
//! A task approaching or crossing its time boundaries escalates through five
//! tiers, each louder than the last:
//!
//! - **PreBlockWarning**: lead time before a time block starts
//! - **CriticalDecision**: at block start, prompts start or skip
//! - **MidBlockWarning**: at the midpoint, a gentle nudge
//! - **NearEndAlert**: shortly before the end, haptic and sound
//! - **Overdue**: the end or due time passed without completion
//!
//! [`ReminderScheduler`] turns a task into concrete triggers and registers
//! them with an [`AlarmRegistrar`], which owns the platform side (wall-clock
//! alarms that fire while the process is suspended).

mod registrar;
mod scheduler;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

pub use registrar::{AlarmRegistrar, CapabilityGap, RecordingRegistrar, RegistrationError};
pub use scheduler::{ReminderConfig, ReminderScheduler, ScheduleReport};

/// Reminder severity. Declaration order is ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    PreBlockWarning,
    CriticalDecision,
    MidBlockWarning,
    NearEndAlert,
    Overdue,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::PreBlockWarning,
        Tier::CriticalDecision,
        Tier::MidBlockWarning,
        Tier::NearEndAlert,
        Tier::Overdue,
    ];

    /// Side effects before user settings are applied.
    pub fn base_effects(self) -> AlertEffects {
        match self {
            Tier::PreBlockWarning | Tier::MidBlockWarning => AlertEffects::notify_only(),
            Tier::CriticalDecision | Tier::NearEndAlert => AlertEffects {
                notify: true,
                vibrate: true,
                sound: true,
                system_alarm: false,
            },
            Tier::Overdue => AlertEffects {
                notify: true,
                vibrate: true,
                sound: true,
                system_alarm: true,
            },
        }
    }

    /// Stable key for registrars that need a per-alarm identifier.
    pub fn alarm_key(self, task_id: &str) -> String {
        format!("{self}:{task_id}")
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::PreBlockWarning => "pre-block-warning",
            Tier::CriticalDecision => "critical-decision",
            Tier::MidBlockWarning => "mid-block-warning",
            Tier::NearEndAlert => "near-end-alert",
            Tier::Overdue => "overdue",
        };
        f.write_str(name)
    }
}

/// What the platform should do when a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEffects {
    pub notify: bool,
    pub vibrate: bool,
    pub sound: bool,
    /// Full-screen / alarm-clock style alert
    pub system_alarm: bool,
}

impl AlertEffects {
    pub fn notify_only() -> Self {
        Self {
            notify: true,
            vibrate: false,
            sound: false,
            system_alarm: false,
        }
    }
}

/// Data handed to the registrar with each trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub title: String,
    pub effects: AlertEffects,
}

/// A single reminder to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub task_id: TaskId,
    pub tier: Tier,
    pub fires_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_ascend_in_severity() {
        let mut sorted = Tier::ALL;
        sorted.sort();
        assert_eq!(sorted, Tier::ALL);
        assert!(Tier::PreBlockWarning < Tier::Overdue);
    }

    #[test]
    fn only_overdue_raises_a_system_alarm() {
        for tier in Tier::ALL {
            assert_eq!(tier.base_effects().system_alarm, tier == Tier::Overdue);
            assert!(tier.base_effects().notify);
        }
    }

    #[test]
    fn alarm_key_is_stable() {
        assert_eq!(Tier::NearEndAlert.alarm_key("task-1"), "near-end-alert:task-1");
    }
}
