//! Recurring template expansion.

use chrono::{DateTime, NaiveDate, Utc};
use focusqueue_core::storage::TaskStore;
use focusqueue_core::RecurrenceExpander;
use tracing::info;

use super::{print_json, CliResult, Session};

pub fn run(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    at: Option<DateTime<Utc>>,
) -> CliResult {
    let session = Session::open(at)?;
    let offset = session.config.offset();
    let from = from.unwrap_or_else(|| session.now.with_timezone(&offset).date_naive());
    let to = to.unwrap_or(from);

    let all = session.store.all()?;
    let mut expander = RecurrenceExpander::new(offset);
    expander.seed(&all);

    let mut created = Vec::new();
    for template in all.iter().filter(|t| t.is_recurring() && !t.archived) {
        for instance in expander.expand(template, from, to)? {
            created.push(session.store.insert(instance)?);
        }
    }
    info!(count = created.len(), %from, %to, "recurring instances created");

    print_json(&created)?;
    session.save()
}
