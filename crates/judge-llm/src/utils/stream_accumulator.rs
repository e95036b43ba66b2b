//! Folds a stream of events back into a complete [`Response`].

use std::collections::HashMap;

use crate::stream::{StreamEvent, StreamEventType};
use crate::types::{ContentPart, FinishReason, Message, Response, Role, ToolCall, Usage};

#[derive(Clone, Debug, Default)]
pub struct ResponseSeed {
    pub id: String,
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    seed: ResponseSeed,
    text: String,
    tool_call_order: Vec<String>,
    tool_calls: HashMap<String, ToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    response: Option<Response>,
    error: Option<String>,
}

impl StreamAccumulator {
    pub fn new(seed: ResponseSeed) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Applies one event and returns the text delta it carried, if any.
    pub fn process(&mut self, event: &StreamEvent) -> Option<String> {
        if let Some(response) = &event.response {
            self.response = Some(response.clone());
        }

        match event.kind()? {
            StreamEventType::StreamStart => {
                if let Some(id) = &event.response_id {
                    self.seed.id = id.clone();
                }
                if let Some(model) = &event.model {
                    self.seed.model = model.clone();
                }
                None
            }
            StreamEventType::TextDelta => {
                let delta = event.delta.clone().filter(|delta| !delta.is_empty())?;
                self.text.push_str(&delta);
                Some(delta)
            }
            StreamEventType::ToolCallStart
            | StreamEventType::ToolCallDelta
            | StreamEventType::ToolCallEnd => {
                if let Some(call) = &event.tool_call {
                    self.upsert_tool_call(call);
                }
                None
            }
            StreamEventType::Finish => {
                if let Some(reason) = &event.finish_reason {
                    self.finish_reason = Some(reason.clone());
                }
                if let Some(usage) = &event.usage {
                    self.usage = Some(usage.clone());
                }
                None
            }
            StreamEventType::Error => {
                self.error = event.error.clone().or(Some("unknown stream error".to_string()));
                None
            }
        }
    }

    /// The error reported in-band by the provider, if the stream carried one.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn response(&self) -> Response {
        if let Some(response) = &self.response {
            return response.clone();
        }

        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentPart::text(self.text.clone()));
        }
        for id in &self.tool_call_order {
            if let Some(call) = self.tool_calls.get(id) {
                content.push(ContentPart::tool_call(call.clone()));
            }
        }

        Response {
            id: self.seed.id.clone(),
            model: self.seed.model.clone(),
            provider: self.seed.provider.clone(),
            message: Message {
                role: Role::Assistant,
                content,
                tool_call_id: None,
            },
            finish_reason: self
                .finish_reason
                .clone()
                .unwrap_or_else(|| FinishReason::new("other")),
            usage: self.usage.clone().unwrap_or_default(),
        }
    }

    fn upsert_tool_call(&mut self, call: &ToolCall) {
        if !self.tool_calls.contains_key(&call.id) {
            self.tool_call_order.push(call.id.clone());
        }
        self.tool_calls.insert(call.id.clone(), call.clone());
    }
}
