//! HTTP adapters for concrete model providers.

mod anthropic;
mod openai;

pub use anthropic::{AnthropicAdapter, AnthropicAdapterConfig};
pub use openai::{OpenAIAdapter, OpenAIAdapterConfig};

use std::collections::VecDeque;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;

use crate::errors::SDKError;
use crate::stream::{StreamEvent, StreamEventStream};
use crate::utils::sse::{SseDecoder, SseEvent};

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Converts provider-specific SSE payloads into [`StreamEvent`]s.
pub(crate) trait SseTranslator: Send + 'static {
    fn translate(&mut self, event: SseEvent) -> Result<Vec<StreamEvent>, SDKError>;

    /// Called once when the body ends; flushes anything still buffered.
    fn finish(&mut self) -> Vec<StreamEvent>;
}

pub(crate) fn http_client() -> Result<reqwest::Client, SDKError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|error| SDKError::configuration(format!("failed to build HTTP client: {error}")))
}

/// Rejects non-2xx responses, extracting the provider's error message when present.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SDKError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SDKError::Provider {
        provider: provider.to_string(),
        status: status.as_u16(),
        message: extract_error_message(&body),
    })
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

struct SseState<T> {
    body: futures::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    decoder: Option<SseDecoder>,
    translator: T,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

pub(crate) fn sse_event_stream<T: SseTranslator>(
    response: reqwest::Response,
    translator: T,
) -> StreamEventStream {
    let state = SseState {
        body: response.bytes_stream().boxed(),
        decoder: Some(SseDecoder::new()),
        translator,
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }

            let decoded = match state.body.next().await {
                Some(Ok(chunk)) => match state.decoder.as_mut() {
                    Some(decoder) => decoder.push_bytes(&chunk),
                    None => Vec::new(),
                },
                Some(Err(error)) => {
                    state.finished = true;
                    return Some((Err(SDKError::from(error)), state));
                }
                None => {
                    state.finished = true;
                    let tail = state.decoder.take().and_then(SseDecoder::finish);
                    tail.into_iter().collect()
                }
            };

            for event in decoded {
                match state.translator.translate(event) {
                    Ok(events) => state.pending.extend(events),
                    Err(error) => {
                        state.finished = true;
                        state.pending.clear();
                        return Some((Err(error), state));
                    }
                }
            }
            if state.finished {
                let flushed = state.translator.finish();
                state.pending.extend(flushed);
            }
        }
    }))
}

/// Renders tool output as the plain string both provider APIs expect.
pub(crate) fn tool_content_to_string(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_json_error_field() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn tool_content_strings_are_not_requoted() {
        assert_eq!(tool_content_to_string(&json!("plain")), "plain");
        assert_eq!(tool_content_to_string(&json!({"a": 1})), "{\"a\":1}");
    }
}
