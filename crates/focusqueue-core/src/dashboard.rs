//! "What now?" view.
//!
//! Reads the clock once, finds the active focus block, and ranks the open
//! tasks against that single instant. Any failure along the way yields the
//! empty state rather than an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::TimeSource;
use crate::focus::{FocusBlock, FocusBlockEvaluator};
use crate::selector::{Selection, TaskSelector};
use crate::storage::TaskStore;
use crate::task::{Task, TaskContext};
use crate::timer::{CountdownEngine, CountdownSnapshot};

/// Everything the dashboard shows at one instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSnapshot {
    pub now: DateTime<Utc>,
    pub active_block: Option<FocusBlock>,
    pub selection: Selection,
    /// Countdown of the current task, if it is timed
    pub countdown: Option<CountdownSnapshot>,
}

impl DashboardSnapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            now,
            active_block: None,
            selection: Selection::empty(),
            countdown: None,
        }
    }

    pub fn current(&self) -> Option<&Task> {
        self.selection.current.as_ref()
    }
}

/// Composes the focus evaluator, selector, and countdown projection.
pub struct Dashboard {
    evaluator: FocusBlockEvaluator,
    selector: TaskSelector,
    engine: CountdownEngine,
    clock: Arc<dyn TimeSource>,
    enforce_blocks: bool,
}

impl Dashboard {
    pub fn new(evaluator: FocusBlockEvaluator, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            evaluator,
            selector: TaskSelector::new(),
            engine: CountdownEngine::new(),
            clock,
            enforce_blocks: true,
        }
    }

    /// Ignore focus blocks when `false`.
    pub fn with_focus_blocks(mut self, enforce: bool) -> Self {
        self.enforce_blocks = enforce;
        self
    }

    /// Snapshot of the store's open tasks at the clock's current instant.
    pub fn snapshot(&self, store: &dyn TaskStore, contexts: &[TaskContext]) -> DashboardSnapshot {
        let now = self.clock.now();
        match store.incomplete() {
            Ok(tasks) => self.snapshot_at(&tasks, contexts, now),
            Err(e) => {
                warn!(error = %e, "task store unavailable, showing empty state");
                DashboardSnapshot::empty(now)
            }
        }
    }

    /// Snapshot of an explicit pool at an explicit instant.
    pub fn snapshot_at(
        &self,
        tasks: &[Task],
        contexts: &[TaskContext],
        now: DateTime<Utc>,
    ) -> DashboardSnapshot {
        let active_block = if self.enforce_blocks {
            self.evaluator.active_block_in_contexts(contexts, now)
        } else {
            None
        };
        let selection = self.selector.select_checked(tasks, active_block, now);
        let countdown = selection
            .current
            .as_ref()
            .filter(|t| t.scheduling.is_timed())
            .map(|t| self.engine.project(t, now));

        DashboardSnapshot {
            now,
            active_block: active_block.cloned(),
            selection,
            countdown,
        }
    }
}
