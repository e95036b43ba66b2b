use judge_llm::Usage;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Processing,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Processing => "PROCESSING",
            Self::Closed => "CLOSED",
        }
    }

    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        if self == next {
            return true;
        }
        match self {
            SessionState::Idle => matches!(next, SessionState::Processing | SessionState::Closed),
            SessionState::Processing => matches!(next, SessionState::Idle | SessionState::Closed),
            SessionState::Closed => false,
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-round policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundOptions {
    /// Actions that must have produced a successful observation before the
    /// coordinator may conclude the round.
    pub required_actions: Vec<String>,
}

impl RoundOptions {
    pub fn requiring<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_actions: actions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: usize,
    /// Text of the coordinator message that ended the round.
    pub final_text: String,
    pub action_cycles: usize,
    pub observations: usize,
    pub error_observations: usize,
    pub usage: Usage,
    /// Required actions still unobserved when the round was allowed to end.
    pub missing_actions: Vec<String>,
}

#[derive(Debug, Default)]
pub(super) struct RoundProgress {
    pub(super) history_start: usize,
    pub(super) cycles: usize,
    pub(super) observations: usize,
    pub(super) error_observations: usize,
    pub(super) reminders_sent: usize,
    pub(super) usage: Usage,
    pub(super) final_text: String,
    pub(super) missing_actions: Vec<String>,
    pub(super) emitted_text: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_terminal() {
        assert!(SessionState::Idle.can_transition_to(&SessionState::Processing));
        assert!(SessionState::Processing.can_transition_to(&SessionState::Idle));
        assert!(SessionState::Processing.can_transition_to(&SessionState::Closed));
        assert!(!SessionState::Closed.can_transition_to(&SessionState::Idle));
        assert_eq!(SessionState::Closed.to_string(), "CLOSED");
    }
}
