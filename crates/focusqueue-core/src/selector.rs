//! Current-priority selection.
//!
//! Filters the open task pool by the active focus block and ranks the rest
//! into a queue. The head of the queue is the "current priority" task.
//!
//! ## Ranking
//!
//! Tasks fall into four status classes, compared first:
//!
//! 1. Active time block (`start <= now < end`), soonest end first
//! 2. Upcoming time block (`now < start`), soonest start first
//! 3. Has a due time, soonest due first
//! 4. Everything else, by priority then oldest first
//!
//! The task id breaks any remaining tie, so the order is total and the same
//! input always yields the same queue.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::focus::FocusBlock;
use crate::task::{Priority, Scheduling, Task};

/// Status class of a task at a given instant. Lower ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    ActiveBlock,
    UpcomingBlock,
    Due,
    Backlog,
}

impl StatusClass {
    pub fn of(task: &Task, now: DateTime<Utc>) -> Self {
        match task.scheduling {
            Scheduling::TimeBlock { start, end } if start <= now && now < end => {
                StatusClass::ActiveBlock
            }
            Scheduling::TimeBlock { start, .. } if now < start => StatusClass::UpcomingBlock,
            _ if task.due_at.is_some() => StatusClass::Due,
            _ => StatusClass::Backlog,
        }
    }
}

/// Result of a selection pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Selection {
    pub current: Option<Task>,
    pub next_up: Vec<Task>,
}

impl Selection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Current followed by next-up, in rank order.
    pub fn queue(&self) -> impl Iterator<Item = &Task> {
        self.current.iter().chain(self.next_up.iter())
    }
}

/// Filters and ranks the task pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSelector;

impl TaskSelector {
    pub fn new() -> Self {
        Self
    }

    /// Whether a task stays visible under the given focus block.
    ///
    /// High-priority tasks bypass focus scoping. Recurring templates never
    /// show up themselves; their expanded instances do.
    pub fn is_visible(task: &Task, active_block: Option<&FocusBlock>) -> bool {
        if !task.is_open() || task.is_recurring() {
            return false;
        }
        match active_block {
            Some(block) => task.context_id == block.context_id || task.priority == Priority::High,
            None => true,
        }
    }

    /// Rank the visible tasks; the head becomes current.
    pub fn select(
        &self,
        tasks: &[Task],
        active_block: Option<&FocusBlock>,
        now: DateTime<Utc>,
    ) -> Selection {
        let mut pool: Vec<Task> = tasks
            .iter()
            .filter(|t| Self::is_visible(t, active_block))
            .cloned()
            .collect();

        pool.sort_by(|a, b| compare(a, b, now));

        let mut queue = pool.into_iter();
        let current = queue.next().map(|mut t| {
            t.is_current_priority = true;
            t
        });
        let next_up: Vec<Task> = queue
            .map(|mut t| {
                t.is_current_priority = false;
                t
            })
            .collect();

        debug!(
            current = current.as_ref().map(|t| t.id.as_str()),
            next_up = next_up.len(),
            focus = active_block.map(|b| b.context_id.as_str()),
            "selection computed"
        );

        Selection { current, next_up }
    }

    /// Like [`select`](Self::select), but validates the pool first.
    ///
    /// Any invalid task means the snapshot is inconsistent; the result is
    /// the empty selection instead of a partial queue.
    pub fn select_checked(
        &self,
        tasks: &[Task],
        active_block: Option<&FocusBlock>,
        now: DateTime<Utc>,
    ) -> Selection {
        for task in tasks {
            if let Err(e) = task.validate() {
                error!(task = %task.id, error = %e, "invalid task in pool, showing empty state");
                return Selection::empty();
            }
        }
        self.select(tasks, active_block, now)
    }
}

/// Total order used by the selector.
pub fn compare(a: &Task, b: &Task, now: DateTime<Utc>) -> Ordering {
    let class_a = StatusClass::of(a, now);
    let class_b = StatusClass::of(b, now);

    class_a
        .cmp(&class_b)
        .then_with(|| match class_a {
            StatusClass::ActiveBlock => block_end(a).cmp(&block_end(b)),
            StatusClass::UpcomingBlock => block_start(a).cmp(&block_start(b)),
            StatusClass::Due => a.due_at.cmp(&b.due_at),
            StatusClass::Backlog => a
                .priority
                .ordinal()
                .cmp(&b.priority.ordinal())
                .then_with(|| a.created_at.cmp(&b.created_at)),
        })
        .then_with(|| a.id.cmp(&b.id))
}

fn block_start(task: &Task) -> Option<DateTime<Utc>> {
    task.scheduling.block().map(|(start, _)| start)
}

fn block_end(task: &Task) -> Option<DateTime<Utc>> {
    task.scheduling.block().map(|(_, end)| end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::TimeOfDay;
    use crate::task::WeekdaySet;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap()
    }

    fn task(id: &str, ctx: &str) -> Task {
        Task::new(id, ctx, t0() - Duration::days(1)).with_id(id)
    }

    fn ids(selection: &Selection) -> Vec<&str> {
        selection.queue().map(|t| t.id.as_str()).collect()
    }

    fn work_block() -> FocusBlock {
        FocusBlock::new(
            "work",
            TimeOfDay::new(9, 0).unwrap(),
            TimeOfDay::new(17, 0).unwrap(),
            WeekdaySet::weekdays(),
        )
    }

    #[test]
    fn status_classes() {
        let now = t0();
        let active = task("a", "w").with_time_block(now - Duration::minutes(5), now + Duration::minutes(5));
        let upcoming = task("u", "w").with_time_block(now + Duration::hours(1), now + Duration::hours(2));
        let past = task("p", "w").with_time_block(now - Duration::hours(2), now - Duration::hours(1));
        let due = task("d", "w").with_due(now + Duration::hours(3));
        let plain = task("x", "w");

        assert_eq!(StatusClass::of(&active, now), StatusClass::ActiveBlock);
        assert_eq!(StatusClass::of(&upcoming, now), StatusClass::UpcomingBlock);
        assert_eq!(StatusClass::of(&past, now), StatusClass::Backlog);
        assert_eq!(StatusClass::of(&due, now), StatusClass::Due);
        assert_eq!(StatusClass::of(&plain, now), StatusClass::Backlog);
    }

    #[test]
    fn block_ending_exactly_now_is_no_longer_active() {
        let now = t0();
        let ended = task("e", "w").with_time_block(now - Duration::hours(1), now);
        assert_eq!(StatusClass::of(&ended, now), StatusClass::Backlog);
    }

    #[test]
    fn classes_rank_in_fixed_order() {
        let now = t0();
        let tasks = vec![
            task("backlog", "w").with_priority(Priority::High),
            task("due", "w").with_due(now - Duration::days(3)),
            task("upcoming", "w").with_time_block(now + Duration::hours(5), now + Duration::hours(6)),
            task("active", "w").with_time_block(now - Duration::hours(1), now + Duration::hours(1)),
        ];
        let sel = TaskSelector::new().select(&tasks, None, now);
        assert_eq!(ids(&sel), vec!["active", "upcoming", "due", "backlog"]);
    }

    #[test]
    fn tie_breaks_within_classes() {
        let now = t0();
        let tasks = vec![
            task("active-late", "w").with_time_block(now - Duration::hours(1), now + Duration::hours(2)),
            task("active-soon", "w").with_time_block(now - Duration::minutes(1), now + Duration::minutes(30)),
            task("up-late", "w").with_time_block(now + Duration::hours(3), now + Duration::hours(4)),
            task("up-soon", "w").with_time_block(now + Duration::hours(1), now + Duration::hours(5)),
            task("due-late", "w").with_due(now + Duration::days(2)),
            task("due-soon", "w").with_due(now + Duration::hours(2)),
        ];
        let sel = TaskSelector::new().select(&tasks, None, now);
        assert_eq!(
            ids(&sel),
            vec!["active-soon", "active-late", "up-soon", "up-late", "due-soon", "due-late"]
        );
    }

    #[test]
    fn backlog_orders_by_priority_then_fifo() {
        let now = t0();
        let mut old_low = task("old-low", "w").with_priority(Priority::Low);
        old_low.created_at = now - Duration::days(10);
        let mut new_med = task("new-med", "w");
        new_med.created_at = now - Duration::hours(1);
        let mut old_med = task("old-med", "w");
        old_med.created_at = now - Duration::days(2);
        let high = task("high", "w").with_priority(Priority::High);

        let sel = TaskSelector::new().select(&[old_low, new_med, old_med, high], None, now);
        assert_eq!(ids(&sel), vec!["high", "old-med", "new-med", "old-low"]);
    }

    #[test]
    fn complete_and_archived_tasks_are_dropped() {
        let now = t0();
        let mut done = task("done", "w");
        done.completed_at = Some(now);
        let mut archived = task("archived", "w");
        archived.archived = true;
        let open = task("open", "w");

        let sel = TaskSelector::new().select(&[done, archived, open], None, now);
        assert_eq!(ids(&sel), vec!["open"]);
    }

    #[test]
    fn recurring_template_yields_to_its_instance() {
        let now = t0();
        let template = task("gym", "w")
            .with_time_block(now - Duration::minutes(30), now + Duration::hours(1))
            .with_recurrence(WeekdaySet::all());
        let mut instance = task("gym-today", "w")
            .with_time_block(now - Duration::minutes(30), now + Duration::hours(1));
        instance.template_id = Some("gym".into());
        instance.occurrence_date = Some(now.date_naive());

        let sel = TaskSelector::new().select(&[template, instance], None, now);
        assert_eq!(ids(&sel), vec!["gym-today"]);
        assert_eq!(sel.current.unwrap().template_id.as_deref(), Some("gym"));
    }

    #[test]
    fn focus_block_filters_but_high_priority_escapes() {
        let now = t0();
        let tasks = vec![
            task("work-low", "work").with_priority(Priority::Low),
            task("health-high", "health").with_priority(Priority::High),
            task("health-med", "health"),
        ];
        let block = work_block();
        let sel = TaskSelector::new().select(&tasks, Some(&block), now);
        assert_eq!(ids(&sel), vec!["health-high", "work-low"]);
        assert!(sel.queue().all(|t| t.context_id == "work" || t.priority == Priority::High));
    }

    #[test]
    fn current_flag_marks_only_the_head() {
        let now = t0();
        let mut stale = task("stale", "w").with_priority(Priority::Low);
        stale.is_current_priority = true;
        let fresh = task("fresh", "w").with_priority(Priority::High);

        let sel = TaskSelector::new().select(&[stale, fresh], None, now);
        assert!(sel.current.as_ref().unwrap().is_current_priority);
        assert_eq!(sel.current.as_ref().unwrap().id, "fresh");
        assert!(sel.next_up.iter().all(|t| !t.is_current_priority));
    }

    #[test]
    fn empty_pool_yields_empty_selection() {
        let sel = TaskSelector::new().select(&[], None, t0());
        assert!(sel.is_empty());
        assert!(sel.next_up.is_empty());
    }

    #[test]
    fn invalid_task_falls_back_to_empty_state() {
        let now = t0();
        let broken = task("broken", "w").with_time_block(now + Duration::hours(1), now);
        let fine = task("fine", "w");
        let sel = TaskSelector::new().select_checked(&[broken, fine], None, now);
        assert_eq!(sel, Selection::empty());
    }
}
