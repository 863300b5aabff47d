//! Async drivers for the engine.
//!
//! - [`CountdownTicker`]: one tokio interval loop per running countdown
//! - [`ReminderService`]: reminder registration with bounded latency

mod reminders;
mod ticker;

pub use reminders::{ReminderService, DEFAULT_REGISTRAR_TIMEOUT};
pub use ticker::CountdownTicker;
