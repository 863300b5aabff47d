//! Context and focus block commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusqueue_core::task::context::ordered;
use focusqueue_core::{FocusBlock, TaskContext, TimeOfDay, WeekdaySet};

use super::{print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum ContextAction {
    /// Create a context
    Add {
        /// Context id
        id: String,
        /// Display name
        name: String,
        /// Position in the display order; earlier contexts win overlapping blocks
        #[arg(long)]
        order: Option<i32>,
    },
    /// List contexts in display order
    List,
    /// Attach a recurring focus block to a context
    Block {
        /// Context id
        context: String,
        /// Start time (HH:mm)
        start: TimeOfDay,
        /// End time (HH:mm); earlier than start wraps past midnight
        end: TimeOfDay,
        /// Weekdays ("daily", "weekdays", "mon,wed" or "1,3"), default every day
        #[arg(long)]
        days: Option<WeekdaySet>,
    },
    /// Remove a focus block by id
    Unblock {
        context: String,
        block_id: String,
    },
}

pub fn run(action: ContextAction, at: Option<DateTime<Utc>>) -> CliResult {
    let mut session = Session::open(at)?;

    match action {
        ContextAction::Add { id, name, order } => {
            let order = order.unwrap_or(session.workspace.contexts.len() as i32);
            let context = session
                .workspace
                .add_context(TaskContext::new(id, name, order))?;
            print_json(context)?;
        }
        ContextAction::List => {
            print_json(&ordered(&session.workspace.contexts))?;
            return Ok(());
        }
        ContextAction::Block {
            context,
            start,
            end,
            days,
        } => {
            let ctx = session
                .workspace
                .context_mut(&context)
                .ok_or_else(|| format!("Context not found: {context}"))?;
            let block = FocusBlock::new(
                context.as_str(),
                start,
                end,
                days.unwrap_or_else(WeekdaySet::empty),
            );
            print_json(ctx.add_block(block))?;
        }
        ContextAction::Unblock { context, block_id } => {
            let ctx = session
                .workspace
                .context_mut(&context)
                .ok_or_else(|| format!("Context not found: {context}"))?;
            let removed = ctx
                .remove_block(&block_id)
                .ok_or_else(|| format!("Focus block not found: {block_id}"))?;
            print_json(&removed)?;
        }
    }

    session.save()
}
