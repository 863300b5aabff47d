//! Async front for the reminder scheduler.
//!
//! Registrar calls may block on platform services, so each one runs on the
//! blocking pool under a timeout. A call that does not answer in time is
//! recorded as a `Timeout` capability gap. When cancelling the previous set
//! fails, nothing new is registered: a late cancel would otherwise wipe it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::warn;

use crate::reminder::{
    AlarmRegistrar, CapabilityGap, RegistrationError, ReminderScheduler, ScheduleReport,
};
use crate::task::Task;

/// Default bound on a single registrar call.
pub const DEFAULT_REGISTRAR_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ReminderService {
    scheduler: Mutex<ReminderScheduler>,
    registrar: Arc<dyn AlarmRegistrar>,
    timeout: Duration,
}

impl ReminderService {
    pub fn new(scheduler: ReminderScheduler, registrar: Arc<dyn AlarmRegistrar>) -> Self {
        Self {
            scheduler: Mutex::new(scheduler),
            registrar,
            timeout: DEFAULT_REGISTRAR_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cancel and re-register the task's triggers.
    pub async fn schedule(&self, task: &Task, now: DateTime<Utc>) -> ScheduleReport {
        let plan = self.lock().prepare(task, now);

        let registrar = Arc::clone(&self.registrar);
        let id = task.id.clone();
        if let Err(error) = self.bounded(move || registrar.cancel(&id)).await {
            warn!(task = %task.id, %error, "cancelling previous reminders failed, skipping registration");
            let outcomes = plan
                .into_iter()
                .map(|trigger| (trigger, Err(error.clone())))
                .collect();
            return self.lock().commit(&task.id, outcomes, now);
        }

        let mut outcomes = Vec::with_capacity(plan.len());
        for trigger in plan {
            let registrar = Arc::clone(&self.registrar);
            let call = trigger.clone();
            let outcome = self
                .bounded(move || registrar.register(&call))
                .await
                .and_then(|result| result);
            outcomes.push((trigger, outcome));
        }

        self.lock().commit(&task.id, outcomes, now)
    }

    /// Drop every trigger for the task and forget its ledger entry.
    pub async fn cancel(&self, task_id: &str) {
        self.lock().forget(task_id);
        let registrar = Arc::clone(&self.registrar);
        let id = task_id.to_string();
        if let Err(error) = self.bounded(move || registrar.cancel(&id)).await {
            warn!(task = %task_id, %error, "cancelling reminders failed");
        }
    }

    pub fn gaps(&self) -> Vec<CapabilityGap> {
        self.lock().gaps().to_vec()
    }

    /// Drain the recorded capability gaps.
    pub fn take_gaps(&self) -> Vec<CapabilityGap> {
        self.lock().take_gaps()
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, RegistrationError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        match timeout(self.timeout, tokio::task::spawn_blocking(call)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join)) => Err(RegistrationError::Rejected(join.to_string())),
            Err(_) => Err(RegistrationError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReminderScheduler> {
        self.scheduler.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::{RecordingRegistrar, Tier, Trigger};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn late_task() -> Task {
        Task::new("Report", "work", t0())
            .with_id("late")
            .with_due(t0() - chrono::Duration::minutes(5))
    }

    #[tokio::test]
    async fn schedules_through_the_blocking_pool() {
        let registrar = Arc::new(RecordingRegistrar::new());
        let service = ReminderService::new(ReminderScheduler::default(), registrar.clone());

        let report = service.schedule(&late_task(), t0()).await;
        assert_eq!(report.tiers(), vec![Tier::Overdue]);
        let again = service.schedule(&late_task(), t0()).await;
        assert!(again.triggers.is_empty());
        assert_eq!(registrar.registrations_of("late", Tier::Overdue), 1);

        service.cancel("late").await;
        assert!(registrar.pending_for("late").is_empty());
    }

    /// Registrar that hangs on one tier.
    struct Stalling {
        inner: RecordingRegistrar,
        stall: Tier,
    }

    impl AlarmRegistrar for Stalling {
        fn register(&self, trigger: &Trigger) -> Result<(), RegistrationError> {
            if trigger.tier == self.stall {
                std::thread::sleep(Duration::from_millis(300));
            }
            self.inner.register(trigger)
        }

        fn cancel(&self, task_id: &str) {
            self.inner.cancel(task_id)
        }
    }

    #[tokio::test]
    async fn slow_registrar_becomes_a_timeout_gap() {
        let registrar = Arc::new(Stalling {
            inner: RecordingRegistrar::new(),
            stall: Tier::Overdue,
        });
        let service = ReminderService::new(ReminderScheduler::default(), registrar)
            .with_timeout(Duration::from_millis(50));

        let task = Task::new("Block", "work", t0())
            .with_id("block")
            .with_time_block(t0() + chrono::Duration::hours(1), t0() + chrono::Duration::hours(2));
        let report = service.schedule(&task, t0()).await;

        assert_eq!(report.triggers.len(), 4);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].tier, Tier::Overdue);
        assert_eq!(report.gaps[0].error, RegistrationError::Timeout(50));
        assert_eq!(service.gaps().len(), 1);
    }

    /// Registrar whose cancel outlives the timeout.
    struct SlowCancel {
        inner: RecordingRegistrar,
    }

    impl AlarmRegistrar for SlowCancel {
        fn register(&self, trigger: &Trigger) -> Result<(), RegistrationError> {
            self.inner.register(trigger)
        }

        fn cancel(&self, task_id: &str) {
            std::thread::sleep(Duration::from_millis(300));
            self.inner.cancel(task_id)
        }
    }

    #[tokio::test]
    async fn failed_cancel_registers_nothing() {
        let registrar = Arc::new(SlowCancel {
            inner: RecordingRegistrar::new(),
        });
        let service = ReminderService::new(ReminderScheduler::default(), registrar.clone())
            .with_timeout(Duration::from_millis(50));

        let task = Task::new("Block", "work", t0())
            .with_id("block")
            .with_time_block(t0() + chrono::Duration::hours(1), t0() + chrono::Duration::hours(2));
        let report = service.schedule(&task, t0()).await;

        assert!(report.triggers.is_empty());
        assert_eq!(report.gaps.len(), 5);
        assert!(report
            .gaps
            .iter()
            .all(|gap| gap.error == RegistrationError::Timeout(50)));

        // The abandoned cancel finishes later; nothing was registered for it to wipe.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(registrar.inner.history().is_empty());
        assert!(registrar.inner.pending_for("block").is_empty());

        assert_eq!(service.take_gaps().len(), 5);
        assert!(service.gaps().is_empty());
    }
}
