//! OpenAI-compatible chat completions adapter (OpenAI, OpenRouter).

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

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenAIAdapterConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub extra_headers: Vec<(String, String)>,
}

impl OpenAIAdapterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "openai".to_string(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            extra_headers: Vec::new(),
        }
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            name: "openrouter".to_string(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            ..Self::new(api_key)
        }
    }
}

pub struct OpenAIAdapter {
    config: OpenAIAdapterConfig,
    http: reqwest::Client,
}

impl OpenAIAdapter {
    pub fn new(config: OpenAIAdapterConfig) -> Result<Self, SDKError> {
        if config.api_key.trim().is_empty() {
            return Err(SDKError::configuration(format!(
                "{} adapter requires a non-empty API key",
                config.name
            )));
        }
        Ok(Self {
            config,
            http: http_client()?,
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, SDKError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut builder = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body);
        for (name, value) in &self.config.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        check_status(&self.config.name, builder.send().await?).await
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: Request) -> Result<Response, SDKError> {
        let body = build_request_body(&request, false);
        let payload: ChatCompletion = self.post(&body).await?.json().await?;
        parse_completion(&self.config.name, payload)
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError> {
        let body = build_request_body(&request, true);
        let response = self.post(&body).await?;
        Ok(sse_event_stream(response, ChunkTranslator::default()))
    }
}

pub(crate) fn build_request_body(request: &Request, stream: bool) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(request.model));
    body.insert(
        "messages".to_string(),
        Value::Array(request.messages.iter().flat_map(convert_message).collect()),
    );
    if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
        let tools: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
        if let Some(choice) = &request.tool_choice {
            body.insert("tool_choice".to_string(), convert_tool_choice(choice));
        }
    }
    if let Some(max_tokens) = request.max_tokens {
        body.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = request.temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    if stream {
        body.insert("stream".to_string(), json!(true));
        body.insert("stream_options".to_string(), json!({ "include_usage": true }));
    }
    Value::Object(body)
}

fn convert_message(message: &Message) -> Vec<Value> {
    match message.role {
        Role::System => vec![json!({ "role": "system", "content": message.text() })],
        Role::User => vec![json!({ "role": "user", "content": message.text() })],
        Role::Assistant => {
            let text = message.text();
            let mut converted = json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            });
            let calls: Vec<Value> = message
                .tool_calls()
                .iter()
                .map(|call| {
                    let arguments = call
                        .raw_arguments
                        .clone()
                        .unwrap_or_else(|| call.arguments.to_string());
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": arguments },
                    })
                })
                .collect();
            if !calls.is_empty() {
                converted["tool_calls"] = Value::Array(calls);
            }
            vec![converted]
        }
        Role::Tool => message
            .content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolResult(result) => Some(json!({
                    "role": "tool",
                    "tool_call_id": result.tool_call_id,
                    "content": tool_content_to_string(&result.content),
                })),
                _ => None,
            })
            .collect(),
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match (choice.mode.as_str(), &choice.tool_name) {
        ("named", Some(name)) => json!({ "type": "function", "function": { "name": name } }),
        (mode, _) => json!(mode),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<ApiUsage> for Usage {
    fn from(usage: ApiUsage) -> Self {
        Usage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    index: Option<u64>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ApiFunction>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

fn parse_completion(provider: &str, payload: ChatCompletion) -> Result<Response, SDKError> {
    let choice = payload
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SDKError::InvalidResponse("completion has no choices".to_string()))?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
        content.push(ContentPart::text(text));
    }
    for (position, call) in choice.message.tool_calls.into_iter().enumerate() {
        let function = call.function.unwrap_or(ApiFunction {
            name: None,
            arguments: None,
        });
        content.push(ContentPart::tool_call(finished_tool_call(
            call.id.unwrap_or_else(|| format!("call_{position}")),
            function.name.unwrap_or_default(),
            function.arguments.unwrap_or_default(),
        )));
    }

    Ok(Response {
        id: payload.id,
        model: payload.model,
        provider: provider.to_string(),
        message: Message {
            role: Role::Assistant,
            content,
            tool_call_id: None,
        },
        finish_reason: normalize_finish_reason(choice.finish_reason),
        usage: payload.usage.map(Usage::from).unwrap_or_default(),
    })
}

/// Parses streamed argument text, keeping it raw when it is not valid JSON so
/// the dispatcher can report the problem.
fn finished_tool_call(id: String, name: String, raw: String) -> ToolCall {
    let raw = if raw.trim().is_empty() {
        "{}".to_string()
    } else {
        raw
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(arguments) => ToolCall::new(id, name, arguments),
        Err(_) => ToolCall {
            id,
            name,
            arguments: Value::Null,
            raw_arguments: Some(raw),
        },
    }
}

fn normalize_finish_reason(raw: Option<String>) -> FinishReason {
    let reason = match raw.as_deref() {
        Some("stop") => "stop",
        Some("length") => "length",
        Some("tool_calls") | Some("function_call") => "tool_calls",
        Some("content_filter") => "content_filter",
        _ => "other",
    };
    FinishReason {
        reason: reason.to_string(),
        raw,
    }
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
pub(crate) struct ChunkTranslator {
    started: bool,
    flushed: bool,
    tool_calls: BTreeMap<u64, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl ChunkTranslator {
    fn flush(&mut self) -> Vec<StreamEvent> {
        if self.flushed {
            return Vec::new();
        }
        self.flushed = true;

        let mut events: Vec<StreamEvent> = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(|partial| {
                StreamEvent::tool_call(
                    StreamEventType::ToolCallEnd,
                    finished_tool_call(partial.id, partial.name, partial.arguments),
                )
            })
            .collect();
        events.push(StreamEvent::finish(
            normalize_finish_reason(self.finish_reason.take()),
            self.usage.take().unwrap_or_default(),
        ));
        events
    }
}

impl SseTranslator for ChunkTranslator {
    fn translate(&mut self, event: SseEvent) -> Result<Vec<StreamEvent>, SDKError> {
        let data = event.data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data == "[DONE]" {
            return Ok(self.flush());
        }

        let chunk: Chunk = serde_json::from_str(data)
            .map_err(|error| SDKError::InvalidResponse(format!("bad stream chunk: {error}")))?;
        if let Some(error) = chunk.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(SDKError::Stream(message));
        }

        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(StreamEvent::stream_start(
                chunk.id.unwrap_or_default(),
                chunk.model.unwrap_or_default(),
            ));
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            let Some(delta) = choice.delta else {
                continue;
            };
            if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
                events.push(StreamEvent::text_delta(text));
            }
            for call in delta.tool_calls {
                let index = call.index.unwrap_or(self.tool_calls.len() as u64);
                let partial = self.tool_calls.entry(index).or_default();
                let is_new = partial.id.is_empty();
                if is_new {
                    // Some compatible servers omit ids; fall back to the position.
                    partial.id = call
                        .id
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| format!("call_{index}"));
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        partial.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial.arguments.push_str(&arguments);
                    }
                }
                if is_new {
                    events.push(StreamEvent::tool_call(
                        StreamEventType::ToolCallStart,
                        ToolCall::new(partial.id.clone(), partial.name.clone(), Value::Null),
                    ));
                }
            }
        }
        Ok(events)
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        self.flush()
    }
}
