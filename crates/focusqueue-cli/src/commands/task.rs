//! Task management and countdown commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusqueue_core::storage::TaskStore;
use focusqueue_core::{
    CountdownEngine, Priority, Scheduling, Task, TaskContext, WeekdaySet,
};
use serde_json::json;
use tracing::info;

use super::{parse_instant, print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Context the task belongs to (created if unknown)
        #[arg(long, default_value = "inbox")]
        context: String,
        /// high, medium or low
        #[arg(long, default_value = "medium")]
        priority: Priority,
        #[arg(long)]
        description: Option<String>,
        /// Time block start (RFC 3339)
        #[arg(long, requires = "block_end", value_parser = parse_instant)]
        block_start: Option<DateTime<Utc>>,
        /// Time block end (RFC 3339)
        #[arg(long, requires = "block_start", value_parser = parse_instant)]
        block_end: Option<DateTime<Utc>>,
        /// Countdown length in minutes
        #[arg(long, conflicts_with = "block_start")]
        minutes: Option<u32>,
        /// Due time (RFC 3339)
        #[arg(long, value_parser = parse_instant)]
        due: Option<DateTime<Utc>>,
        /// Repeat on these weekdays ("daily", "weekdays", "mon,wed" or "1,3")
        #[arg(long)]
        repeat: Option<WeekdaySet>,
    },
    /// Change a task's fields; scheduling edits reset its countdown
    Edit {
        /// Task id (or unique prefix)
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, requires = "block_end", value_parser = parse_instant)]
        block_start: Option<DateTime<Utc>>,
        #[arg(long, requires = "block_start", value_parser = parse_instant)]
        block_end: Option<DateTime<Utc>>,
        #[arg(long, conflicts_with = "block_start")]
        minutes: Option<u32>,
        #[arg(long, value_parser = parse_instant)]
        due: Option<DateTime<Utc>>,
        /// Remove the due time
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
    },
    /// List tasks
    List {
        /// Include completed and archived tasks
        #[arg(long)]
        all: bool,
        /// Only tasks in this context
        #[arg(long)]
        context: Option<String>,
    },
    /// Show a task with its projected countdown
    Show {
        id: String,
    },
    /// Start a duration countdown
    Start {
        id: String,
    },
    /// Pause a running duration countdown
    Pause {
        id: String,
    },
    /// Resume a paused countdown
    Resume {
        id: String,
    },
    /// Mark a task complete
    Complete {
        id: String,
        /// Optional note kept with the completed task
        #[arg(long)]
        reflection: Option<String>,
    },
    /// Hide a task from the queue without completing it
    Archive {
        id: String,
    },
    /// Delete a task
    Delete {
        id: String,
    },
}

pub fn run(action: TaskAction, at: Option<DateTime<Utc>>) -> CliResult {
    let mut session = Session::open(at)?;
    let now = session.now;
    let engine = CountdownEngine::new();

    match action {
        TaskAction::Add {
            title,
            context,
            priority,
            description,
            block_start,
            block_end,
            minutes,
            due,
            repeat,
        } => {
            ensure_context(&mut session, &context)?;
            let mut task = Task::new(title, context, now)
                .with_priority(priority)
                .with_scheduling(scheduling(block_start, block_end, minutes));
            task.description = description;
            task.due_at = due;
            task.recurrence = repeat;

            let task = session.store.insert(task)?;
            eprintln!("Task created: {}", task.id);
            print_json(&task)?;
        }
        TaskAction::Edit {
            id,
            title,
            priority,
            context,
            block_start,
            block_end,
            minutes,
            due,
            clear_due,
        } => {
            let id = session.resolve(&id)?;
            if let Some(ctx) = &context {
                ensure_context(&mut session, ctx)?;
            }
            let reschedule = block_start.is_some() || minutes.is_some();
            let new_scheduling = scheduling(block_start, block_end, minutes);
            let (task, ()) = session.modify(&id, |task| {
                if let Some(title) = &title {
                    task.title = title.clone();
                }
                if let Some(priority) = priority {
                    task.priority = priority;
                }
                if let Some(ctx) = &context {
                    task.context_id = ctx.clone();
                }
                if reschedule {
                    task.scheduling = new_scheduling;
                    task.reset_timer();
                }
                if due.is_some() || clear_due {
                    task.due_at = due;
                }
                task.updated_at = now;
                Ok(())
            })?;
            print_json(&task)?;
        }
        TaskAction::List { all, context } => {
            let tasks = if all {
                session.store.all()?
            } else {
                session.store.incomplete()?
            };
            let filtered: Vec<Task> = tasks
                .into_iter()
                .filter(|t| context.as_ref().map_or(true, |c| &t.context_id == c))
                .collect();
            print_json(&filtered)?;
            return Ok(());
        }
        TaskAction::Show { id } => {
            let id = session.resolve(&id)?;
            let task = session.store.get(&id)?;
            let countdown = task
                .scheduling
                .is_timed()
                .then(|| engine.project(&task, now));
            print_json(&json!({ "task": task, "countdown": countdown }))?;
            return Ok(());
        }
        TaskAction::Start { id } => {
            let id = session.resolve(&id)?;
            let (task, event) = session.modify(&id, |task| Ok(engine.start(task, now)?))?;
            print_json(&json!({ "event": event, "task": task }))?;
        }
        TaskAction::Pause { id } => {
            let id = session.resolve(&id)?;
            let (task, event) = session.modify(&id, |task| Ok(engine.pause(task, now)?))?;
            print_json(&json!({ "event": event, "task": task }))?;
        }
        TaskAction::Resume { id } => {
            let id = session.resolve(&id)?;
            let (task, event) = session.modify(&id, |task| Ok(engine.resume(task, now)?))?;
            print_json(&json!({ "event": event, "task": task }))?;
        }
        TaskAction::Complete { id, reflection } => {
            let id = session.resolve(&id)?;
            let (task, event) = session.modify(&id, |task| {
                Ok(engine.complete(task, now, reflection.clone())?)
            })?;
            print_json(&json!({ "event": event, "task": task }))?;
        }
        TaskAction::Archive { id } => {
            let id = session.resolve(&id)?;
            let (task, ()) = session.modify(&id, |task| {
                task.archived = true;
                task.is_current_priority = false;
                task.updated_at = now;
                Ok(())
            })?;
            print_json(&task)?;
        }
        TaskAction::Delete { id } => {
            let id = session.resolve(&id)?;
            let task = session.store.delete(&id)?;
            eprintln!("Task deleted: {}", task.id);
        }
    }

    session.save()
}

fn scheduling(
    block_start: Option<DateTime<Utc>>,
    block_end: Option<DateTime<Utc>>,
    minutes: Option<u32>,
) -> Scheduling {
    match (block_start, block_end, minutes) {
        (Some(start), Some(end), _) => Scheduling::TimeBlock { start, end },
        (_, _, Some(total_minutes)) => Scheduling::Duration { total_minutes },
        _ => Scheduling::None,
    }
}

/// Register an unknown context at the end of the display order.
fn ensure_context(session: &mut Session, id: &str) -> CliResult {
    if session.workspace.context(id).is_none() {
        let order = session.workspace.contexts.len() as i32;
        session
            .workspace
            .add_context(TaskContext::new(id, id, order))?;
        info!(context = id, "context created");
    }
    Ok(())
}
