use crate::AgentError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024;
pub const DEFAULT_MAX_TOKENS: u32 = 16_384;

/// Directories never descended into when searching the repository. Hidden
/// directories are skipped regardless of this list.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".build",
    ".venv",
    "venv",
    ".tox",
    "Pods",
    "DerivedData",
];

/// Runtime configuration for a review session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Upper bound on Reason -> Act cycles within one round.
    pub max_action_cycles_per_round: usize,
    /// Per-action timeout. Zero disables it.
    pub action_timeout_ms: u64,
    pub parallel_actions: bool,
    /// How often one round may send the coordinator back for missing
    /// required actions before letting it conclude anyway.
    pub completeness_reminders: usize,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_action_cycles_per_round: 25,
            action_timeout_ms: 180_000,
            parallel_actions: true,
            completeness_reminders: 1,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_action_cycles_per_round == 0 {
            return Err(AgentError::invalid_configuration(
                "max_action_cycles_per_round must be at least 1",
            ));
        }
        if self.max_tokens == 0 {
            return Err(AgentError::invalid_configuration(
                "max_tokens must be at least 1",
            ));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(AgentError::invalid_configuration(format!(
                    "temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }
        Ok(())
    }

    pub fn action_timeout(&self) -> Option<Duration> {
        (self.action_timeout_ms > 0).then(|| Duration::from_millis(self.action_timeout_ms))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub root: PathBuf,
    pub max_file_bytes: u64,
    pub skip_dirs: Vec<String>,
}

impl RepositoryConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|dir| dir.to_string()).collect(),
        }
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn is_skipped_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.skip_dirs.iter().any(|dir| dir == name)
    }
}
