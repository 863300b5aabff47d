//! Reminder registration from the command line.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use focusqueue_core::storage::TaskStore;
use focusqueue_core::{
    AlarmRegistrar, Event, RegistrationError, ReminderScheduler, ReminderService, Trigger,
};
use tracing::info;

use super::{print_json, CliResult, Session};

/// Registrar for a terminal session: there is no platform alarm service, so
/// triggers are only logged and reported.
struct LogRegistrar;

impl AlarmRegistrar for LogRegistrar {
    fn register(&self, trigger: &Trigger) -> Result<(), RegistrationError> {
        info!(
            task = %trigger.task_id,
            tier = %trigger.tier,
            fires_at = %trigger.fires_at,
            "reminder registered"
        );
        Ok(())
    }

    fn cancel(&self, task_id: &str) {
        info!(task = task_id, "reminders cancelled");
    }
}

pub fn run(id: &str, cancel: bool, at: Option<DateTime<Utc>>) -> CliResult {
    let session = Session::open(at)?;
    let id = session.resolve(id)?;
    let task = session.store.get(&id)?;

    let service = ReminderService::new(
        ReminderScheduler::new(session.config.reminders.clone()),
        Arc::new(LogRegistrar),
    )
    .with_timeout(Duration::from_millis(
        session.config.runtime.registrar_timeout_ms,
    ));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if cancel {
        runtime.block_on(service.cancel(&task.id));
        return print_json(&Event::RemindersCancelled {
            task_id: task.id,
            at: session.now,
        });
    }

    let report = runtime.block_on(service.schedule(&task, session.now));
    print_json(&serde_json::json!({
        "event": report.to_event(session.now),
        "triggers": report.triggers,
    }))
}
