//! Provider-neutral request, response and message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Add;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
///
/// Providers that stream arguments as a JSON string leave them in
/// `raw_arguments`; parsing is deferred to whoever dispatches the call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub raw_arguments: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            raw_arguments: None,
        }
    }

    /// Arguments as a JSON object, parsing `raw_arguments` when present.
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        match &self.raw_arguments {
            Some(raw) if raw.trim().is_empty() => Ok(Value::Object(Default::default())),
            Some(raw) => serde_json::from_str(raw),
            None => Ok(self.arguments.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: Value,
    pub is_error: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self::ToolCall(call)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_text(Role::Assistant, text)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: Value, is_error: bool) -> Self {
        let tool_call_id = tool_call_id.into();
        Self {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult(ToolResult {
                tool_call_id: tool_call_id.clone(),
                content,
                is_error,
            })],
            tool_call_id: Some(tool_call_id),
        }
    }

    fn with_text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::text(text)],
            tool_call_id: None,
        }
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoice {
    pub mode: String,
    pub tool_name: Option<String>,
}

impl ToolChoice {
    pub fn auto() -> Self {
        Self {
            mode: "auto".to_string(),
            tool_name: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    pub provider: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl Request {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            provider: None,
            tools: None,
            tool_choice: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishReason {
    pub reason: String,
    pub raw: Option<String>,
}

impl FinishReason {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub provider: String,
    pub message: Message,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Response {
    pub fn text(&self) -> String {
        self.message.text()
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.message.tool_calls()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_text_joins_text_parts_and_skips_tool_calls() {
        let message = Message {
            role: Role::Assistant,
            content: vec![
                ContentPart::text("Looking at "),
                ContentPart::tool_call(ToolCall::new("c1", "get_diff", json!({}))),
                ContentPart::text("the diff."),
            ],
            tool_call_id: None,
        };
        assert_eq!(message.text(), "Looking at the diff.");
        assert_eq!(message.tool_calls().len(), 1);
    }

    #[test]
    fn raw_arguments_take_precedence_over_structured_arguments() {
        let mut call = ToolCall::new("c1", "read_file", json!({"file_path": "ignored"}));
        call.raw_arguments = Some("{\"file_path\":\"src/lib.rs\"}".to_string());
        assert_eq!(
            call.parsed_arguments().expect("valid json"),
            json!({"file_path": "src/lib.rs"})
        );

        call.raw_arguments = Some("  ".to_string());
        assert_eq!(call.parsed_arguments().expect("empty object"), json!({}));

        call.raw_arguments = Some("{not json".to_string());
        assert!(call.parsed_arguments().is_err());
    }

    #[test]
    fn usage_addition_sums_all_counters() {
        let total = Usage::new(10, 5) + Usage::new(1, 2);
        assert_eq!(total, Usage::new(11, 7));
        assert_eq!(total.total_tokens, 18);
    }
}
