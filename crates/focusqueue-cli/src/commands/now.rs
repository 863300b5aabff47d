//! The "what is now" view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use focusqueue_core::{Dashboard, FocusBlockEvaluator, ManualClock};

use super::{print_json, CliResult, Session};

pub fn run(at: Option<DateTime<Utc>>) -> CliResult {
    let session = Session::open(at)?;
    let dashboard = Dashboard::new(
        FocusBlockEvaluator::new(session.config.offset()),
        Arc::new(ManualClock::new(session.now)),
    )
    .with_focus_blocks(session.config.focus.enforce_blocks);

    let snapshot = dashboard.snapshot(session.store.as_ref(), &session.workspace.contexts);
    print_json(&snapshot)
}
