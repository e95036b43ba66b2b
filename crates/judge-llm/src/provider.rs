//! Provider adapter contract.

use async_trait::async_trait;

use crate::errors::SDKError;
use crate::stream::StreamEventStream;
use crate::types::{Request, Response};

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: Request) -> Result<Response, SDKError>;

    async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError>;
}
