pub mod config;
pub mod context;
pub mod expand;
pub mod now;
pub mod remind;
pub mod task;
pub mod tick;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use focusqueue_core::storage::{update_with_retry, Config, MemoryTaskStore, TaskStore, Workspace};
use focusqueue_core::{CoreError, SystemClock, Task, TimeSource};
use tracing::debug;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// State loaded for one invocation: configuration, the workspace snapshot,
/// and the store rebuilt from it.
pub struct Session {
    pub config: Config,
    pub workspace: Workspace,
    pub store: Arc<MemoryTaskStore>,
    /// Instant every engine call in this invocation uses
    pub now: DateTime<Utc>,
    path: PathBuf,
}

impl Session {
    pub fn open(at: Option<DateTime<Utc>>) -> CliResult<Self> {
        let config = Config::load_or_default();
        let path = Workspace::default_path()?;
        let workspace = Workspace::load(&path)?;
        let store = Arc::new(workspace.store());
        let now = at.unwrap_or_else(|| SystemClock.now());
        debug!(path = %path.display(), tasks = workspace.tasks.len(), %now, "session opened");
        Ok(Self {
            config,
            workspace,
            store,
            now,
            path,
        })
    }

    /// Write the store back into the snapshot file.
    pub fn save(mut self) -> CliResult {
        self.workspace.capture(self.store.as_ref())?;
        self.workspace.save(&self.path)?;
        Ok(())
    }

    /// Read-modify-write a task with the configured retry budget.
    pub fn modify<T>(
        &self,
        id: &str,
        apply: impl FnMut(&mut Task) -> Result<T, CoreError>,
    ) -> Result<(Task, T), CoreError> {
        update_with_retry(
            self.store.as_ref(),
            id,
            self.config.runtime.store_retry_attempts,
            apply,
        )
    }

    /// Resolve a full id or a unique prefix of one.
    pub fn resolve(&self, id: &str) -> CliResult<String> {
        if self.store.get(id).is_ok() {
            return Ok(id.to_string());
        }
        let matches: Vec<String> = self
            .store
            .all()?
            .into_iter()
            .map(|t| t.id)
            .filter(|candidate| candidate.starts_with(id))
            .collect();
        match matches.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(format!("Task not found: {id}").into()),
            _ => Err(format!("Ambiguous task id '{id}' matches {} tasks", matches.len()).into()),
        }
    }
}

/// clap value parser for RFC 3339 instants.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
