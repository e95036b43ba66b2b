use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the judge-agent crate.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("session is closed")]
    SessionClosed,
    #[error("invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("round exceeded its budget of {limit} action cycles")]
    LoopBudgetExceeded { limit: usize },
    #[error("round aborted")]
    Aborted,
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Llm(#[from] judge_llm::SDKError),
}

impl AgentError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    UnknownAction,
    Validation,
    Execution,
    Timeout,
    Repository,
    DuplicateAction,
    /// The request was never executed because the round ended first.
    Cancelled,
}

impl ActionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAction => "unknown_action",
            Self::Validation => "validation",
            Self::Execution => "execution",
            Self::Timeout => "timeout",
            Self::Repository => "repository",
            Self::DuplicateAction => "duplicate_action",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A failed action dispatch. The rendered text is what the coordinator sees.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Error executing action '{action_name}': {message}")]
pub struct ActionError {
    pub kind: ActionErrorKind,
    pub action_name: String,
    pub message: String,
}

impl ActionError {
    pub fn new(
        kind: ActionErrorKind,
        action_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            action_name: action_name.into(),
            message: message.into(),
        }
    }

    pub fn unknown(action_name: impl Into<String>) -> Self {
        let action_name = action_name.into();
        let message = format!("unknown action '{action_name}'");
        Self::new(ActionErrorKind::UnknownAction, action_name, message)
    }

    pub fn validation(action_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Validation, action_name, message)
    }

    pub fn execution(action_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Execution, action_name, message)
    }

    pub fn timeout(action_name: impl Into<String>, timeout_ms: u64) -> Self {
        Self::new(
            ActionErrorKind::Timeout,
            action_name,
            format!("timed out after {timeout_ms} ms"),
        )
    }

    pub fn duplicate(action_name: impl Into<String>) -> Self {
        let action_name = action_name.into();
        let message = format!("action '{action_name}' is already registered");
        Self::new(ActionErrorKind::DuplicateAction, action_name, message)
    }

    pub fn cancelled(action_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Cancelled, action_name, reason)
    }

    /// Folds an executor failure into an action error, keeping repository
    /// violations distinguishable from other failures.
    pub fn from_agent_error(action_name: impl Into<String>, error: AgentError) -> Self {
        match error {
            AgentError::Action(mut error) => {
                if error.action_name.is_empty() {
                    error.action_name = action_name.into();
                }
                error
            }
            AgentError::Repository(error) => {
                Self::new(ActionErrorKind::Repository, action_name, error.to_string())
            }
            other => Self::execution(action_name, other.to_string()),
        }
    }
}

/// Failures of sandboxed repository queries.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("path '{path}' is outside the repository")]
    OutsideRepository { path: String },
    #[error("file '{path}' not found")]
    NotFound { path: String },
    #[error("invalid branch name '{name}'")]
    InvalidBranch { name: String },
    #[error("file '{path}' is too large ({size} bytes, max {max})")]
    TooLarge { path: String, size: u64, max: u64 },
    #[error("git failed while {operation}: {stderr}")]
    Git { operation: String, stderr: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RepositoryError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
