//! Streaming event model shared by every provider adapter.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::errors::SDKError;
use crate::types::{FinishReason, Response, ToolCall, Usage};

pub type StreamEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, SDKError>> + Send>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    StreamStart,
    TextDelta,
    ToolCallStart,
    ToolCallDelta,
    ToolCallEnd,
    Finish,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEventTypeOrString {
    Known(StreamEventType),
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event_type: StreamEventTypeOrString,
    pub response_id: Option<String>,
    pub model: Option<String>,
    pub delta: Option<String>,
    pub tool_call: Option<ToolCall>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    pub response: Option<Response>,
    pub error: Option<String>,
}

impl StreamEvent {
    pub fn new(kind: StreamEventType) -> Self {
        Self {
            event_type: StreamEventTypeOrString::Known(kind),
            response_id: None,
            model: None,
            delta: None,
            tool_call: None,
            finish_reason: None,
            usage: None,
            response: None,
            error: None,
        }
    }

    pub fn other(name: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventTypeOrString::Other(name.into()),
            ..Self::new(StreamEventType::StreamStart)
        }
    }

    pub fn stream_start(response_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            response_id: Some(response_id.into()),
            model: Some(model.into()),
            ..Self::new(StreamEventType::StreamStart)
        }
    }

    pub fn text_delta(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            ..Self::new(StreamEventType::TextDelta)
        }
    }

    pub fn tool_call(kind: StreamEventType, call: ToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::new(kind)
        }
    }

    pub fn finish(finish_reason: FinishReason, usage: Usage) -> Self {
        Self {
            finish_reason: Some(finish_reason),
            usage: Some(usage),
            ..Self::new(StreamEventType::Finish)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(StreamEventType::Error)
        }
    }

    pub fn kind(&self) -> Option<StreamEventType> {
        match &self.event_type {
            StreamEventTypeOrString::Known(kind) => Some(*kind),
            StreamEventTypeOrString::Other(_) => None,
        }
    }
}

/// Replays a complete response as a stream: one text delta, one event per
/// tool call, then a finish event carrying the response itself.
pub fn replay_response(response: Response) -> StreamEventStream {
    let mut events = vec![StreamEvent::stream_start(
        response.id.clone(),
        response.model.clone(),
    )];
    let text = response.text();
    if !text.is_empty() {
        events.push(StreamEvent::text_delta(text));
    }
    for call in response.tool_calls() {
        events.push(StreamEvent::tool_call(StreamEventType::ToolCallEnd, call));
    }
    let mut finish = StreamEvent::finish(response.finish_reason.clone(), response.usage.clone());
    finish.response = Some(response);
    events.push(finish);

    Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
}
