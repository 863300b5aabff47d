//! JSON snapshot of tasks and contexts.
//!
//! The CLI keeps its state in `workspace.json` inside the data directory and
//! rebuilds a [`MemoryTaskStore`] from it on every invocation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{data_dir, MemoryTaskStore, TaskStore};
use crate::error::{ConfigError, CoreError, ValidationError};
use crate::task::{Task, TaskContext};

/// Everything the CLI persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub contexts: Vec<TaskContext>,
}

impl Workspace {
    /// `workspace.json` inside the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("workspace.json"))
    }

    /// Read a snapshot; a missing file is an empty workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the snapshot through a temporary file and rename.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), tasks = self.tasks.len(), "workspace saved");
        Ok(())
    }

    /// Store holding a copy of the tasks.
    pub fn store(&self) -> MemoryTaskStore {
        MemoryTaskStore::with_tasks(self.tasks.iter().cloned())
    }

    /// Replace the tasks with the store's contents.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub fn capture(&mut self, store: &dyn TaskStore) -> Result<(), CoreError> {
        self.tasks = store.all()?;
        Ok(())
    }

    pub fn context(&self, id: &str) -> Option<&TaskContext> {
        self.contexts.iter().find(|c| c.id == id)
    }

    pub fn context_mut(&mut self, id: &str) -> Option<&mut TaskContext> {
        self.contexts.iter_mut().find(|c| c.id == id)
    }

    /// Add a context, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or duplicate id.
    pub fn add_context(&mut self, context: TaskContext) -> Result<&TaskContext, ValidationError> {
        if context.id.trim().is_empty() {
            return Err(ValidationError::value("context id", "must not be empty"));
        }
        if self.context(&context.id).is_some() {
            return Err(ValidationError::value(
                "context id",
                format!("'{}' already exists", context.id),
            ));
        }
        self.contexts.push(context);
        let last = self.contexts.len() - 1;
        Ok(&self.contexts[last])
    }
}
