//! Anthropic Messages API adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{SseTranslator, check_status, http_client, sse_event_stream, tool_content_to_string};
use crate::errors::SDKError;
use crate::provider::ProviderAdapter;
use crate::stream::{StreamEvent, StreamEventStream, StreamEventType};
use crate::types::{
    ContentPart, FinishReason, Message, Request, Response, Role, ToolCall, ToolChoice, Usage,
};
use crate::utils::sse::SseEvent;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 16_384;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnthropicAdapterConfig {
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    /// Used when a request does not set `max_tokens`; the API requires one.
    pub default_max_tokens: u32,
}

impl AnthropicAdapterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_version: ANTHROPIC_VERSION.to_string(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

pub struct AnthropicAdapter {
    config: AnthropicAdapterConfig,
    http: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new(config: AnthropicAdapterConfig) -> Result<Self, SDKError> {
        if config.api_key.trim().is_empty() {
            return Err(SDKError::configuration(
                "anthropic adapter requires a non-empty API key",
            ));
        }
        Ok(Self {
            config,
            http: http_client()?,
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, SDKError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(body)
            .send()
            .await?;
        check_status("anthropic", response).await
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: Request) -> Result<Response, SDKError> {
        let body = build_request_body(&request, self.config.default_max_tokens, false);
        let payload: ApiMessage = self.post(&body).await?.json().await?;
        Ok(parse_message(payload))
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError> {
        let body = build_request_body(&request, self.config.default_max_tokens, true);
        let response = self.post(&body).await?;
        Ok(sse_event_stream(response, EventTranslator::default()))
    }
}

pub(crate) fn build_request_body(request: &Request, default_max_tokens: u32, stream: bool) -> Value {
    let system: Vec<String> = request
        .messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(Message::text)
        .filter(|text| !text.is_empty())
        .collect();

    let mut messages: Vec<Value> = Vec::new();
    for message in request.messages.iter().filter(|m| m.role != Role::System) {
        let role = match message.role {
            Role::Assistant => "assistant",
            _ => "user",
        };
        let blocks = convert_blocks(message);
        if blocks.is_empty() {
            continue;
        }
        // The API rejects consecutive turns with the same role.
        match messages.last_mut() {
            Some(last) if last["role"] == role => {
                if let Some(content) = last["content"].as_array_mut() {
                    content.extend(blocks);
                }
            }
            _ => messages.push(json!({ "role": role, "content": blocks })),
        }
    }

    let mut body = Map::new();
    body.insert("model".to_string(), json!(request.model));
    body.insert(
        "max_tokens".to_string(),
        json!(request.max_tokens.unwrap_or(default_max_tokens)),
    );
    body.insert("messages".to_string(), Value::Array(messages));
    if !system.is_empty() {
        body.insert("system".to_string(), json!(system.join("\n\n")));
    }
    if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
        let tools: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
        if let Some(choice) = request.tool_choice.as_ref().and_then(convert_tool_choice) {
            body.insert("tool_choice".to_string(), choice);
        }
    }
    if let Some(temperature) = request.temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    if stream {
        body.insert("stream".to_string(), json!(true));
    }
    Value::Object(body)
}

fn convert_blocks(message: &Message) -> Vec<Value> {
    message
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } if text.is_empty() => None,
            ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
            ContentPart::ToolCall(call) => {
                let input = match call.parsed_arguments() {
                    Ok(Value::Object(map)) => Value::Object(map),
                    _ => json!({}),
                };
                Some(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": input,
                }))
            }
            ContentPart::ToolResult(result) => Some(json!({
                "type": "tool_result",
                "tool_use_id": result.tool_call_id,
                "content": tool_content_to_string(&result.content),
                "is_error": result.is_error,
            })),
        })
        .collect()
}

fn convert_tool_choice(choice: &ToolChoice) -> Option<Value> {
    match (choice.mode.as_str(), &choice.tool_name) {
        ("auto", _) => Some(json!({ "type": "auto" })),
        ("required", _) => Some(json!({ "type": "any" })),
        ("named", Some(name)) => Some(json!({ "type": "tool", "name": name })),
        _ => None,
    }
}

fn normalize_stop_reason(raw: Option<String>) -> FinishReason {
    let reason = match raw.as_deref() {
        Some("end_turn") | Some("stop_sequence") => "stop",
        Some("tool_use") => "tool_calls",
        Some("max_tokens") => "length",
        _ => "other",
    };
    FinishReason {
        reason: reason.to_string(),
        raw,
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ApiBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ApiUsage,
}

fn parse_message(payload: ApiMessage) -> Response {
    let content = payload
        .content
        .into_iter()
        .filter_map(|block| match block {
            ApiBlock::Text { text } if !text.is_empty() => Some(ContentPart::text(text)),
            ApiBlock::ToolUse { id, name, input } => {
                Some(ContentPart::tool_call(ToolCall::new(id, name, input)))
            }
            _ => None,
        })
        .collect();

    Response {
        id: payload.id,
        model: payload.model,
        provider: "anthropic".to_string(),
        message: Message {
            role: Role::Assistant,
            content,
            tool_call_id: None,
        },
        finish_reason: normalize_stop_reason(payload.stop_reason),
        usage: Usage::new(payload.usage.input_tokens, payload.usage.output_tokens),
    }
}

#[derive(Debug)]
struct OpenToolUse {
    id: String,
    name: String,
    json: String,
}

#[derive(Debug, Default)]
pub(crate) struct EventTranslator {
    tool_uses: BTreeMap<u64, OpenToolUse>,
    stop_reason: Option<String>,
    input_tokens: u64,
    output_tokens: u64,
    finished: bool,
}

impl EventTranslator {
    fn finish_event(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![StreamEvent::finish(
            normalize_stop_reason(self.stop_reason.take()),
            Usage::new(self.input_tokens, self.output_tokens),
        )]
    }

    fn close_block(&mut self, index: u64) -> Option<StreamEvent> {
        let open = self.tool_uses.remove(&index)?;
        let raw = if open.json.trim().is_empty() {
            "{}".to_string()
        } else {
            open.json
        };
        let call = match serde_json::from_str::<Value>(&raw) {
            Ok(arguments) => ToolCall::new(open.id, open.name, arguments),
            Err(_) => ToolCall {
                id: open.id,
                name: open.name,
                arguments: Value::Null,
                raw_arguments: Some(raw),
            },
        };
        Some(StreamEvent::tool_call(StreamEventType::ToolCallEnd, call))
    }
}

impl SseTranslator for EventTranslator {
    fn translate(&mut self, event: SseEvent) -> Result<Vec<StreamEvent>, SDKError> {
        if event.data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let payload: Value = serde_json::from_str(&event.data)
            .map_err(|error| SDKError::InvalidResponse(format!("bad stream event: {error}")))?;
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .or(event.event.as_deref())
            .unwrap_or_default()
            .to_string();
        let index = payload.get("index").and_then(Value::as_u64).unwrap_or(0);

        let mut events = Vec::new();
        match kind.as_str() {
            "message_start" => {
                let message = &payload["message"];
                self.input_tokens = message
                    .pointer("/usage/input_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                events.push(StreamEvent::stream_start(
                    message["id"].as_str().unwrap_or_default(),
                    message["model"].as_str().unwrap_or_default(),
                ));
            }
            "content_block_start" => {
                let block = &payload["content_block"];
                match block["type"].as_str() {
                    Some("tool_use") => {
                        let id = block["id"].as_str().unwrap_or_default().to_string();
                        let name = block["name"].as_str().unwrap_or_default().to_string();
                        events.push(StreamEvent::tool_call(
                            StreamEventType::ToolCallStart,
                            ToolCall::new(id.clone(), name.clone(), Value::Null),
                        ));
                        self.tool_uses.insert(
                            index,
                            OpenToolUse {
                                id,
                                name,
                                json: String::new(),
                            },
                        );
                    }
                    Some("text") => {
                        if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                            events.push(StreamEvent::text_delta(text));
                        }
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let delta = &payload["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        if let Some(text) = delta["text"].as_str().filter(|t| !t.is_empty()) {
                            events.push(StreamEvent::text_delta(text));
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(open) = self.tool_uses.get_mut(&index) {
                            open.json
                                .push_str(delta["partial_json"].as_str().unwrap_or_default());
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => events.extend(self.close_block(index)),
            "message_delta" => {
                if let Some(reason) = payload.pointer("/delta/stop_reason").and_then(Value::as_str)
                {
                    self.stop_reason = Some(reason.to_string());
                }
                if let Some(tokens) = payload
                    .pointer("/usage/output_tokens")
                    .and_then(Value::as_u64)
                {
                    self.output_tokens = tokens;
                }
            }
            "message_stop" => events.extend(self.finish_event()),
            "error" => {
                let message = payload
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("stream error")
                    .to_string();
                return Err(SDKError::Stream(message));
            }
            _ => {}
        }
        Ok(events)
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        let indexes: Vec<u64> = self.tool_uses.keys().copied().collect();
        let mut events: Vec<StreamEvent> = indexes
            .into_iter()
            .filter_map(|index| self.close_block(index))
            .collect();
        events.extend(self.finish_event());
        events
    }
}
