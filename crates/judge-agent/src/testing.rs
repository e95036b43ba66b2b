//! Scripted model adapters shared by unit tests.

use async_trait::async_trait;
use judge_llm::{
    Client, ContentPart, FinishReason, Message, ProviderAdapter, Request, Response, Role,
    SDKError, StreamEvent, StreamEventStream, ToolCall, Usage, replay_response,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub(crate) enum ScriptStep {
    Respond(Response),
    Fail(SDKError),
    /// The stream opens but never yields.
    Hang,
}

#[derive(Clone)]
pub(crate) struct ScriptedAdapter {
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
    pub(crate) requests: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedAdapter {
    fn next_step(&self, request: Request) -> ScriptStep {
        self.requests.lock().expect("requests mutex").push(request);
        self.script
            .lock()
            .expect("script mutex")
            .pop_front()
            .unwrap_or_else(|| ScriptStep::Fail(SDKError::configuration("no response queued")))
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: Request) -> Result<Response, SDKError> {
        match self.next_step(request) {
            ScriptStep::Respond(response) => Ok(response),
            ScriptStep::Fail(error) => Err(error),
            ScriptStep::Hang => std::future::pending().await,
        }
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError> {
        match self.next_step(request) {
            ScriptStep::Respond(response) => Ok(replay_response(response)),
            ScriptStep::Fail(error) => Err(error),
            ScriptStep::Hang => Ok(Box::pin(futures::stream::pending::<
                Result<StreamEvent, SDKError>,
            >())),
        }
    }
}

pub(crate) fn scripted_client(steps: Vec<ScriptStep>) -> (Arc<Client>, ScriptedAdapter) {
    let adapter = ScriptedAdapter {
        script: Arc::new(Mutex::new(VecDeque::from(steps))),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let mut client = Client::default();
    client
        .register_provider(Arc::new(adapter.clone()))
        .expect("provider should register");
    (Arc::new(client), adapter)
}

pub(crate) fn text_response(text: &str) -> Response {
    Response {
        id: "resp-text".to_string(),
        model: "scripted-model".to_string(),
        provider: "scripted".to_string(),
        message: Message::assistant(text),
        finish_reason: FinishReason::new("stop"),
        usage: Usage::new(10, 5),
    }
}

pub(crate) fn action_response(text: &str, calls: Vec<(&str, &str, Value)>) -> Response {
    let mut content = Vec::new();
    if !text.is_empty() {
        content.push(ContentPart::text(text));
    }
    content.extend(
        calls
            .into_iter()
            .map(|(id, name, arguments)| ContentPart::tool_call(ToolCall::new(id, name, arguments))),
    );
    Response {
        id: "resp-actions".to_string(),
        model: "scripted-model".to_string(),
        provider: "scripted".to_string(),
        message: Message {
            role: Role::Assistant,
            content,
            tool_call_id: None,
        },
        finish_reason: FinishReason::new("tool_calls"),
        usage: Usage::new(10, 5),
    }
}
