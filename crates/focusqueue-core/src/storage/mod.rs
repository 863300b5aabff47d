mod config;
pub mod memory;
pub mod workspace;

pub use config::{ClockConfig, Config, FocusConfig, RuntimeConfig};
pub use memory::{update_with_retry, MemoryTaskStore, Subscription, TaskStore};
pub use workspace::Workspace;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/focusqueue[-dev]/` based on FOCUSQUEUE_ENV.
///
/// Set FOCUSQUEUE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSQUEUE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusqueue-dev")
    } else {
        base_dir.join("focusqueue")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
