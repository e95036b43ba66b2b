use std::time::Instant;

use async_trait::async_trait;

use crate::client::{CompleteHandler, Middleware, StreamHandler};
use crate::errors::SDKError;
use crate::stream::StreamEventStream;
use crate::types::{Request, Response};

/// Logs every model call through `tracing`.
#[derive(Clone, Debug, Default)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle_complete(
        &self,
        request: Request,
        next: CompleteHandler,
    ) -> Result<Response, SDKError> {
        let provider = request.provider.clone().unwrap_or_default();
        let model = request.model.clone();
        let messages = request.messages.len();
        let started = Instant::now();

        let result = next(request).await;
        match &result {
            Ok(response) => tracing::debug!(
                %provider,
                %model,
                messages,
                output_tokens = response.usage.output_tokens,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "model completion finished"
            ),
            Err(error) => tracing::warn!(%provider, %model, %error, "model completion failed"),
        }
        result
    }

    async fn handle_stream(
        &self,
        request: Request,
        next: StreamHandler,
    ) -> Result<StreamEventStream, SDKError> {
        let provider = request.provider.clone().unwrap_or_default();
        let model = request.model.clone();
        let messages = request.messages.len();
        let tools = request.tools.as_ref().map_or(0, Vec::len);
        let started = Instant::now();

        let result = next(request).await;
        match &result {
            Ok(_) => tracing::debug!(
                %provider,
                %model,
                messages,
                tools,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "model stream opened"
            ),
            Err(error) => tracing::warn!(%provider, %model, %error, "model stream failed to open"),
        }
        result
    }
}
