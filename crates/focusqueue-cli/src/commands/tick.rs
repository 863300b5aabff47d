//! Countdown reconciliation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use focusqueue_core::storage::TaskStore;
use focusqueue_core::{CountdownEngine, CountdownTicker, Event, SystemClock, TimerState};
use tracing::{debug, warn};

use super::{print_json, CliResult, Session};

pub fn run(watch: Option<u64>, at: Option<DateTime<Utc>>) -> CliResult {
    let session = Session::open(at)?;
    match watch {
        None => tick_all(session),
        Some(seconds) => {
            if at.is_some() {
                warn!("--at is ignored while watching; the system clock drives the countdown");
            }
            watch_for(session, Duration::from_secs(seconds))
        }
    }
}

/// Tick every open timed task once at the session instant.
fn tick_all(session: Session) -> CliResult {
    let engine = CountdownEngine::new();
    let mut events: Vec<Event> = Vec::new();

    for task in session.store.incomplete()? {
        if !task.scheduling.is_timed() || task.is_recurring() {
            continue;
        }
        let mut ticked = task.clone();
        let event = engine.tick(&mut ticked, session.now);
        if ticked == task {
            continue;
        }
        session.store.update(ticked)?;
        events.extend(event);
    }

    print_json(&events)?;
    session.save()
}

/// Run live countdown loops until every countdown stops or the time is up.
fn watch_for(session: Session, limit: Duration) -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let ticker = CountdownTicker::new(
            session.store.clone(),
            Arc::new(SystemClock),
            Duration::from_millis(session.config.runtime.tick_interval_ms),
        );
        let mut events = ticker.subscribe();

        let mut watched = Vec::new();
        for task in session.store.incomplete()? {
            let live = task.timer_state == TimerState::Running
                || (task.timer_state == TimerState::NotStarted && task.scheduling.block().is_some());
            if live && !task.is_recurring() {
                ticker.watch(&task.id);
                watched.push(task.id);
            }
        }
        debug!(count = watched.len(), "watching countdowns");

        let deadline = tokio::time::Instant::now() + limit;
        while watched.iter().any(|id| ticker.is_watching(id)) {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Ok(event)) => println!("{}", serde_json::to_string(&event)?),
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "event output fell behind");
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) | Err(_) => break,
            }
        }
        ticker.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    session.save()
}
