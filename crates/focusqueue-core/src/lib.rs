//! # focusqueue core library
//!
//! Task selection, countdown, and reminder-tiering engine behind the
//! `focusqueue` CLI. The engine answers one question at a time: given an
//! unordered pool of tasks and the current instant, which task is "now"?
//!
//! ## Architecture
//!
//! - **Focus blocks**: recurring daily windows that scope the pool to one
//!   context ([`FocusBlockEvaluator`])
//! - **Selection**: filter and rank the pool into a queue ([`TaskSelector`])
//! - **Countdown**: wall-clock-based timer state machine; the caller invokes
//!   `tick()` periodically ([`CountdownEngine`], [`CountdownTicker`])
//! - **Reminders**: five escalating tiers registered with a platform
//!   [`AlarmRegistrar`] ([`ReminderScheduler`])
//! - **Recurrence**: materialise recurring templates ([`RecurrenceExpander`])
//! - **Storage**: [`TaskStore`] with optimistic versioning, TOML [`Config`],
//!   JSON [`Workspace`] snapshot
//!
//! Every engine call takes `now` explicitly; only [`Dashboard`] and the
//! runtime read a [`TimeSource`].

pub mod clock;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod focus;
pub mod recurrence;
pub mod reminder;
pub mod runtime;
pub mod selector;
pub mod storage;
pub mod task;
pub mod timer;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use error::{ConfigError, CoreError, CountdownError, StoreError, ValidationError};
pub use events::{Event, FinishReason};
pub use focus::{FocusBlock, FocusBlockEvaluator, TimeOfDay};
pub use recurrence::RecurrenceExpander;
pub use reminder::{
    AlarmRegistrar, CapabilityGap, RecordingRegistrar, RegistrationError, ReminderConfig,
    ReminderScheduler, ScheduleReport, Tier, Trigger,
};
pub use runtime::{CountdownTicker, ReminderService};
pub use selector::{Selection, StatusClass, TaskSelector};
pub use storage::{Config, MemoryTaskStore, TaskStore, Workspace};
pub use task::{Priority, Scheduling, Task, TaskContext, TimerState, WeekdaySet};
pub use timer::{CountdownEngine, CountdownSnapshot};
