//! Engine configuration (ambient stack, teacher's `config.rs` pattern).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    Parse(String),
}

/// Tunable parameters for the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default saga timeout in seconds, applied at `start` if the command
    /// doesn't override it.
    pub default_timeout_seconds: i64,
    /// Minimum time (seconds) a saga must have left before `evaluateFailedStep`
    /// will allow entering `REVERTING`; below this, timeout is extended or
    /// the saga goes to `REVERT_FAILED` (spec §4.6, §9).
    pub min_compensation_budget_seconds: i64,
    /// Actions that, once succeeded, can never be compensated — a success
    /// of one of these forces `MANUAL_REVIEW` on a later failure rather
    /// than `REVERTING` (spec §4.6 item 2, §9 Open Question).
    pub non_undoable_actions: Vec<String>,
    /// Recovery sweep cadence.
    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub interval_seconds: u64,
    pub staleness_seconds: i64,
    pub batch_limit: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            staleness_seconds: 120,
            batch_limit: 50,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: 30 * 60,
            min_compensation_budget_seconds: 5 * 60,
            non_undoable_actions: vec!["CREATE_SHIPMENT".to_string(), "SEND_NOTIFICATION".to_string()],
            recovery: RecoveryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    pub fn is_non_undoable(&self, action: &str) -> bool {
        self.non_undoable_actions.iter().any(|a| a == action)
    }

    pub fn min_compensation_budget(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_compensation_budget_seconds)
    }

    pub fn default_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_timeout_seconds)
    }
}
