//! Recurring task expansion.
//!
//! A recurring task is a template. Expansion materialises one plain task per
//! matching date, shifting its times by whole days so the time of day and the
//! block length carry over. Each `(template_id, occurrence_date)` pair is
//! produced at most once per expander.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;

use crate::error::ValidationError;
use crate::task::{new_task_id, Scheduling, Task, TaskId};

/// Materialises occurrences of recurring templates.
#[derive(Debug, Clone)]
pub struct RecurrenceExpander {
    offset: FixedOffset,
    materialized: HashSet<(TaskId, NaiveDate)>,
}

impl RecurrenceExpander {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            materialized: HashSet::new(),
        }
    }

    /// Remember occurrences that already exist, complete or archived ones
    /// included, so they are never generated again.
    pub fn seed<'a>(&mut self, tasks: impl IntoIterator<Item = &'a Task>) {
        for task in tasks {
            if let (Some(template), Some(date)) = (&task.template_id, task.occurrence_date) {
                self.materialized.insert((template.clone(), date));
            }
        }
    }

    pub fn is_materialized(&self, template_id: &str, date: NaiveDate) -> bool {
        self.materialized
            .contains(&(template_id.to_string(), date))
    }

    /// Occurrences of `template` in `[from, to]` not produced before.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateWindow` when `from` is after `to`.
    pub fn expand(
        &mut self,
        template: &Task,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Task>, ValidationError> {
        if from > to {
            return Err(ValidationError::InvalidDateWindow { from, to });
        }
        let Some(days) = template.recurrence else {
            return Ok(Vec::new());
        };
        if template.archived {
            return Ok(Vec::new());
        }

        let anchor = self.anchor_date(template);
        let mut instances = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            if !days.contains(date.weekday()) {
                continue;
            }
            if !self.materialized.insert((template.id.clone(), date)) {
                continue;
            }
            instances.push(self.instantiate(template, anchor, date));
        }

        debug!(
            template = %template.id,
            %from,
            %to,
            created = instances.len(),
            "expanded recurring task"
        );
        Ok(instances)
    }

    /// Local date the template's own times belong to.
    fn anchor_date(&self, template: &Task) -> NaiveDate {
        let reference = match template.scheduling {
            Scheduling::TimeBlock { start, .. } => start,
            _ => template.due_at.unwrap_or(template.created_at),
        };
        reference.with_timezone(&self.offset).date_naive()
    }

    fn instantiate(&self, template: &Task, anchor: NaiveDate, date: NaiveDate) -> Task {
        let shift = Duration::days((date - anchor).num_days());
        let created_at = self.start_of(date);

        let scheduling = match template.scheduling {
            Scheduling::TimeBlock { start, end } => Scheduling::TimeBlock {
                start: start + shift,
                end: end + shift,
            },
            other => other,
        };

        let mut task = template.clone().with_scheduling(scheduling);
        task.id = new_task_id();
        task.due_at = template.due_at.map(|due| due + shift);
        task.recurrence = None;
        task.template_id = Some(template.id.clone());
        task.occurrence_date = Some(date);
        task.completed_at = None;
        task.completion_reflection = None;
        task.is_current_priority = false;
        task.created_at = created_at;
        task.updated_at = created_at;
        task.version = 0;
        task
    }

    fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        self.offset
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc())
    }
}
