//! End-to-end scenarios across the engine components.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use focusqueue_core::{
    CountdownEngine, Dashboard, FocusBlock, FocusBlockEvaluator, ManualClock, MemoryTaskStore,
    Priority, RecordingRegistrar, RecurrenceExpander, ReminderScheduler, TaskContext, TaskSelector,
    TaskStore, Task, Tier, TimeOfDay, TimerState, WeekdaySet,
};

fn utc(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    // March 2025: the 10th is a Monday.
    Utc.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
}

fn offset() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn work_context() -> TaskContext {
    let mut work = TaskContext::new("work", "Work", 0);
    work.add_block(FocusBlock::new(
        "work",
        TimeOfDay::new(9, 0).unwrap(),
        TimeOfDay::new(17, 0).unwrap(),
        WeekdaySet::weekdays(),
    ));
    work
}

#[test]
fn scenario_a_time_block_midpoint() {
    let t = utc(10, 9, 0);
    let task = Task::new("Deep work", "work", t - Duration::days(1))
        .with_time_block(t, t + Duration::seconds(3600));

    let snap = CountdownEngine::new().project(&task, t + Duration::seconds(1800));
    assert_eq!(snap.remaining_secs, 1800);
    assert_eq!(snap.state, TimerState::Running);
}

#[test]
fn scenario_b_high_priority_escapes_focus_block() {
    let contexts = vec![work_context(), TaskContext::new("health", "Health", 1)];
    let created = utc(10, 7, 0);
    let pool = vec![
        Task::new("Expense report", "work", created)
            .with_id("work-low")
            .with_priority(Priority::Low),
        Task::new("Physio exercises", "health", created)
            .with_id("health-high")
            .with_priority(Priority::High),
    ];

    let now = utc(10, 10, 0);
    let evaluator = FocusBlockEvaluator::new(offset());
    let block = evaluator.active_block_in_contexts(&contexts, now);
    assert_eq!(block.map(|b| b.context_id.as_str()), Some("work"));

    let selection = TaskSelector::new().select(&pool, block, now);
    let current = selection.current.as_ref().unwrap();
    assert_eq!(current.id, "health-high");
    assert!(current.is_current_priority);
    assert_eq!(selection.next_up.len(), 1);
    assert_eq!(selection.next_up[0].id, "work-low");
    assert!(!selection.next_up[0].is_current_priority);
}

#[test]
fn scenario_b_through_the_dashboard() {
    let store = MemoryTaskStore::new();
    let created = utc(10, 7, 0);
    store
        .insert(
            Task::new("Expense report", "work", created)
                .with_id("work-low")
                .with_priority(Priority::Low),
        )
        .unwrap();
    store
        .insert(
            Task::new("Physio exercises", "health", created)
                .with_id("health-high")
                .with_priority(Priority::High),
        )
        .unwrap();
    store
        .insert(Task::new("Groceries", "home", created).with_id("home-medium"))
        .unwrap();

    let contexts = vec![work_context()];
    let dashboard = Dashboard::new(
        FocusBlockEvaluator::new(offset()),
        Arc::new(ManualClock::new(utc(10, 10, 0))),
    );
    let snap = dashboard.snapshot(&store, &contexts);
    let ids: Vec<&str> = snap.selection.queue().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["health-high", "work-low"]);

    // Saturday: the weekday block is closed and home tasks come back.
    let weekend = Dashboard::new(
        FocusBlockEvaluator::new(offset()),
        Arc::new(ManualClock::new(utc(15, 10, 0))),
    );
    assert_eq!(weekend.snapshot(&store, &contexts).selection.queue().count(), 3);
}

#[test]
fn scenario_c_single_overdue_trigger() {
    let now = utc(10, 12, 0);
    let task = Task::new("File taxes", "admin", utc(1, 8, 0))
        .with_id("taxes")
        .with_due(now - Duration::hours(2));
    let registrar = RecordingRegistrar::new();
    let mut scheduler = ReminderScheduler::default();

    let first = scheduler.schedule_for(&task, now, &registrar);
    assert_eq!(first.tiers(), vec![Tier::Overdue]);
    assert_eq!(first.triggers[0].fires_at, now);

    for minutes in [0, 1, 5, 60, 600] {
        scheduler.schedule_for(&task, now + Duration::minutes(minutes), &registrar);
    }
    assert_eq!(registrar.registrations_of("taxes", Tier::Overdue), 1);
    assert_eq!(registrar.history().len(), 1);
}

#[test]
fn active_block_outranks_any_due_time() {
    let now = utc(10, 10, 0);
    let pool = vec![
        Task::new("Due in a minute", "work", utc(1, 8, 0))
            .with_id("due")
            .with_priority(Priority::High)
            .with_due(now + Duration::minutes(1)),
        Task::new("Meeting", "work", utc(1, 8, 0))
            .with_id("meeting")
            .with_priority(Priority::Low)
            .with_time_block(now - Duration::minutes(30), now + Duration::hours(3)),
    ];
    let selection = TaskSelector::new().select(&pool, None, now);
    assert_eq!(selection.current.map(|t| t.id), Some("meeting".to_string()));
}

#[test]
fn recurring_instances_join_the_queue() {
    let store = MemoryTaskStore::new();
    let template = Task::new("Standup", "work", utc(1, 8, 0))
        .with_id("standup")
        .with_time_block(utc(3, 9, 30), utc(3, 9, 45))
        .with_recurrence(WeekdaySet::weekdays());
    store.insert(template.clone()).unwrap();

    let mut expander = RecurrenceExpander::new(offset());
    expander.seed(&store.all().unwrap());
    let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    for instance in expander.expand(&template, day, day).unwrap() {
        store.insert(instance).unwrap();
    }
    // A second expansion over the same window adds nothing.
    let mut again = RecurrenceExpander::new(offset());
    again.seed(&store.all().unwrap());
    assert!(again.expand(&template, day, day).unwrap().is_empty());

    // The template itself is a block from last week; today's instance is active.
    let now = utc(10, 9, 35);
    let pool = store.incomplete().unwrap();
    let selection = TaskSelector::new().select(&pool, None, now);
    let current = selection.current.unwrap();
    assert_eq!(current.template_id.as_deref(), Some("standup"));
    assert_eq!(current.scheduling.block(), Some((utc(10, 9, 30), utc(10, 9, 45))));
}

#[test]
fn template_on_its_own_day_stays_out_of_the_queue() {
    let store = MemoryTaskStore::new();
    let template = Task::new("Gym", "health", utc(1, 8, 0))
        .with_id("gym")
        .with_time_block(utc(10, 7, 0), utc(10, 8, 30))
        .with_recurrence(WeekdaySet::all());
    store.insert(template.clone()).unwrap();

    let mut expander = RecurrenceExpander::new(offset());
    expander.seed(&store.all().unwrap());
    let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    for instance in expander.expand(&template, day, day).unwrap() {
        store.insert(instance).unwrap();
    }

    let now = utc(10, 7, 30);
    let selection = TaskSelector::new().select(&store.incomplete().unwrap(), None, now);
    assert_eq!(selection.queue().count(), 1);
    let current = selection.current.unwrap();
    assert_ne!(current.id, "gym");
    assert_eq!(current.template_id.as_deref(), Some("gym"));

    // The template itself never schedules reminders.
    let registrar = RecordingRegistrar::new();
    let report = ReminderScheduler::default().schedule_for(&template, utc(10, 6, 0), &registrar);
    assert!(report.triggers.is_empty());
}

#[test]
fn duration_lifecycle_with_reminders() {
    let engine = CountdownEngine::new();
    let registrar = RecordingRegistrar::new();
    let mut scheduler = ReminderScheduler::default();
    let t = utc(10, 14, 0);
    let mut task = Task::new("Write draft", "work", t).with_id("draft").with_duration(30);

    assert!(scheduler.schedule_for(&task, t, &registrar).triggers.is_empty());

    engine.start(&mut task, t).unwrap();
    let running = scheduler.schedule_for(&task, t, &registrar);
    assert_eq!(
        running.tiers(),
        vec![Tier::MidBlockWarning, Tier::NearEndAlert, Tier::Overdue]
    );

    engine.pause(&mut task, t + Duration::minutes(10)).unwrap();
    let paused = scheduler.schedule_for(&task, t + Duration::minutes(10), &registrar);
    assert!(paused.triggers.is_empty());
    assert!(registrar.pending_for("draft").is_empty());

    engine.resume(&mut task, t + Duration::minutes(20)).unwrap();
    let resumed = scheduler.schedule_for(&task, t + Duration::minutes(20), &registrar);
    let overdue = resumed
        .triggers
        .iter()
        .find(|tr| tr.tier == Tier::Overdue)
        .unwrap();
    assert_eq!(overdue.fires_at, t + Duration::minutes(40));

    engine
        .complete(&mut task, t + Duration::minutes(35), Some("done early".into()))
        .unwrap();
    let done = scheduler.schedule_for(&task, t + Duration::minutes(35), &registrar);
    assert!(done.triggers.is_empty());
    assert!(registrar.pending_for("draft").is_empty());
}
