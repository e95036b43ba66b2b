use crate::{ActionError, ActionErrorKind};
use crate::events::current_timestamp;
use judge_llm::{ContentPart, Message, Role, ToolCall, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Timestamp = String;

/// Who produced a turn, as the orchestration loop sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Coordinator,
    ActionResult,
}

/// A coordinator's request to run one action. Arguments are validated at
/// dispatch time, so malformed ones are carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    pub action_name: String,
    pub arguments: Value,
    pub raw_arguments: Option<String>,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, action_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            action_name: action_name.into(),
            arguments,
            raw_arguments: None,
        }
    }

    pub fn parsed_arguments(&self) -> Result<Value, ActionError> {
        let Some(raw) = &self.raw_arguments else {
            return Ok(self.arguments.clone());
        };
        if raw.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(raw).map_err(|error| {
            ActionError::validation(
                self.action_name.clone(),
                format!("invalid JSON arguments: {error}"),
            )
        })
    }
}

impl From<ToolCall> for ActionRequest {
    fn from(call: ToolCall) -> Self {
        Self {
            id: call.id,
            action_name: call.name,
            arguments: call.arguments,
            raw_arguments: call.raw_arguments,
        }
    }
}

impl From<&ActionRequest> for ToolCall {
    fn from(request: &ActionRequest) -> Self {
        ToolCall {
            id: request.id.clone(),
            name: request.action_name.clone(),
            arguments: request.arguments.clone(),
            raw_arguments: request.raw_arguments.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserTurn {
    pub content: String,
    pub timestamp: Timestamp,
}

impl UserTurn {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: current_timestamp(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorTurn {
    pub content: String,
    pub requests: Vec<ActionRequest>,
    pub usage: Usage,
    pub response_id: Option<String>,
    pub timestamp: Timestamp,
}

impl CoordinatorTurn {
    pub fn new(content: impl Into<String>, requests: Vec<ActionRequest>, usage: Usage) -> Self {
        Self {
            content: content.into(),
            requests,
            usage,
            response_id: None,
            timestamp: current_timestamp(),
        }
    }
}

/// The result of exactly one [`ActionRequest`], correlated by `request_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub request_id: String,
    pub action_name: String,
    pub content: String,
    pub is_error: bool,
    pub error_kind: Option<ActionErrorKind>,
    pub timestamp: Timestamp,
}

impl Observation {
    pub fn from_result(
        request_id: impl Into<String>,
        action_name: impl Into<String>,
        result: Result<String, ActionError>,
    ) -> Self {
        let (content, error_kind) = match result {
            Ok(output) => (output, None),
            Err(error) => (error.to_string(), Some(error.kind)),
        };
        Self {
            request_id: request_id.into(),
            action_name: action_name.into(),
            is_error: error_kind.is_some(),
            content,
            error_kind,
            timestamp: current_timestamp(),
        }
    }
}

/// A loop-injected nudge, presented to the coordinator as user input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReminderTurn {
    pub content: String,
    pub timestamp: Timestamp,
}

impl ReminderTurn {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: current_timestamp(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Turn {
    User(UserTurn),
    Coordinator(CoordinatorTurn),
    Observation(Observation),
    Reminder(ReminderTurn),
}

impl Turn {
    pub fn role(&self) -> TurnRole {
        match self {
            Self::User(_) | Self::Reminder(_) => TurnRole::User,
            Self::Coordinator(_) => TurnRole::Coordinator,
            Self::Observation(_) => TurnRole::ActionResult,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User(turn) => &turn.content,
            Self::Coordinator(turn) => &turn.content,
            Self::Observation(turn) => &turn.content,
            Self::Reminder(turn) => &turn.content,
        }
    }

    pub fn requests(&self) -> &[ActionRequest] {
        match self {
            Self::Coordinator(turn) => &turn.requests,
            _ => &[],
        }
    }
}

pub fn history_to_messages(history: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len());
    for turn in history {
        match turn {
            Turn::User(turn) => messages.push(Message::user(turn.content.clone())),
            Turn::Reminder(turn) => messages.push(Message::user(turn.content.clone())),
            Turn::Coordinator(turn) => {
                let mut content = Vec::new();
                if !turn.content.is_empty() {
                    content.push(ContentPart::text(turn.content.clone()));
                }
                content.extend(
                    turn.requests
                        .iter()
                        .map(|request| ContentPart::tool_call(ToolCall::from(request))),
                );
                if content.is_empty() {
                    content.push(ContentPart::text(String::new()));
                }
                messages.push(Message {
                    role: Role::Assistant,
                    content,
                    tool_call_id: None,
                });
            }
            Turn::Observation(turn) => messages.push(Message::tool_result(
                turn.request_id.clone(),
                Value::String(turn.content.clone()),
                turn.is_error,
            )),
        }
    }
    messages
}
