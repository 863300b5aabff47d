//! Per-task countdown loop.
//!
//! Each watched task gets a tokio task that wakes on an interval, re-reads
//! the task from the store, runs [`CountdownEngine::tick`] and writes back
//! any change. The loop ends by itself once the countdown stops running, and
//! [`CountdownTicker::cancel`] aborts it immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::TimeSource;
use crate::error::StoreError;
use crate::events::Event;
use crate::storage::TaskStore;
use crate::task::{Scheduling, TaskId, TimerState};
use crate::timer::CountdownEngine;

const EVENT_CAPACITY: usize = 64;

/// What one tick decided.
#[derive(Debug, Clone, PartialEq)]
enum TickOutcome {
    /// Keep ticking
    Continue(Option<Event>),
    /// Countdown is over or gone; end the loop
    Stop(Option<Event>),
}

/// Drives countdowns on a tokio interval.
pub struct CountdownTicker {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn TimeSource>,
    engine: CountdownEngine,
    interval: Duration,
    events: broadcast::Sender<Event>,
    handles: Mutex<HashMap<TaskId, JoinHandle<()>>>,
}

impl CountdownTicker {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn TimeSource>, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            clock,
            engine: CountdownEngine::new(),
            interval: interval.max(Duration::from_millis(10)),
            events,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Events produced by ticks (starts, expiries, clock rewinds).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Start ticking a task, replacing any loop already running for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(&self, task_id: &str) {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let events = self.events.clone();
        let engine = self.engine;
        let period = self.interval;
        let id = task_id.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let outcome = tick_once(store.as_ref(), clock.as_ref(), engine, &id);
                let (event, stop) = match outcome {
                    TickOutcome::Continue(event) => (event, false),
                    TickOutcome::Stop(event) => (event, true),
                };
                if let Some(event) = event {
                    let _ = events.send(event);
                }
                if stop {
                    debug!(task = %id, "countdown loop finished");
                    break;
                }
            }
        });

        if let Some(previous) = self.lock().insert(task_id.to_string(), handle) {
            previous.abort();
        }
    }

    /// Abort the loop for a task. Returns whether one was registered.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.lock().remove(task_id) {
            Some(handle) => {
                handle.abort();
                debug!(task = %task_id, "countdown loop cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a loop for the task is still alive.
    pub fn is_watching(&self, task_id: &str) -> bool {
        self.lock()
            .get(task_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort every loop.
    pub fn shutdown(&self) {
        for (_, handle) in self.lock().drain() {
            handle.abort();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn tick_once(
    store: &dyn TaskStore,
    clock: &dyn TimeSource,
    engine: CountdownEngine,
    id: &str,
) -> TickOutcome {
    let task = match store.get(id) {
        Ok(task) => task,
        Err(StoreError::NotFound(_)) => return TickOutcome::Stop(None),
        Err(e) => {
            warn!(task = %id, error = %e, "countdown tick could not read task");
            return TickOutcome::Continue(None);
        }
    };

    let waiting_block = matches!(task.scheduling, Scheduling::TimeBlock { .. })
        && task.timer_state == TimerState::NotStarted;
    let live = task.timer_state == TimerState::Running || waiting_block;
    if !task.is_open() || task.is_recurring() || !live {
        return TickOutcome::Stop(None);
    }

    let mut next = task.clone();
    let event = engine.tick(&mut next, clock.now());
    let running = next.timer_state == TimerState::Running
        || (waiting_block && next.timer_state == TimerState::NotStarted);

    if next != task {
        match store.update(next) {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => {
                // Someone else wrote first; the next tick starts from their copy.
                debug!(task = %id, "countdown tick lost a write race");
                return TickOutcome::Continue(None);
            }
            Err(e) => {
                warn!(task = %id, error = %e, "countdown tick could not save task");
                return TickOutcome::Continue(None);
            }
        }
    }

    if running {
        TickOutcome::Continue(event)
    } else {
        TickOutcome::Stop(event)
    }
}
