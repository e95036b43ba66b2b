//! Core client and middleware system.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::errors::SDKError;
use crate::provider::ProviderAdapter;
use crate::stream::StreamEventStream;
use crate::types::{Request, Response};

pub type CompleteHandler =
    Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Response, SDKError>> + Send + Sync>;
pub type StreamHandler =
    Arc<dyn Fn(Request) -> BoxFuture<'static, Result<StreamEventStream, SDKError>> + Send + Sync>;

/// Middleware for wrapping complete() and stream() calls.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle_complete(
        &self,
        request: Request,
        next: CompleteHandler,
    ) -> Result<Response, SDKError>;

    async fn handle_stream(
        &self,
        request: Request,
        next: StreamHandler,
    ) -> Result<StreamEventStream, SDKError>;
}

#[derive(Clone, Default)]
pub struct Client {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    default_provider: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Client {
    /// Registers an adapter under its own name. The first adapter becomes the default.
    pub fn register_provider(&mut self, provider: Arc<dyn ProviderAdapter>) -> Result<(), SDKError> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(SDKError::configuration(format!(
                "provider '{name}' is already registered"
            )));
        }
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn set_default_provider(&mut self, provider: impl Into<String>) -> Result<(), SDKError> {
        let provider = provider.into();
        if !self.providers.contains_key(&provider) {
            return Err(SDKError::configuration(format!(
                "cannot default to unregistered provider '{provider}'"
            )));
        }
        self.default_provider = Some(provider);
        Ok(())
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub async fn complete(&self, mut request: Request) -> Result<Response, SDKError> {
        let adapter = self.resolve_adapter(&mut request)?;

        let base: CompleteHandler = Arc::new(move |req| {
            let adapter = adapter.clone();
            Box::pin(async move { adapter.complete(req).await })
        });

        let handler = self.middleware.iter().rev().fold(base, |next, middleware| {
            let middleware = middleware.clone();
            Arc::new(move |req| {
                let middleware = middleware.clone();
                let next = next.clone();
                Box::pin(async move { middleware.handle_complete(req, next).await })
            })
        });

        handler(request).await
    }

    pub async fn stream(&self, mut request: Request) -> Result<StreamEventStream, SDKError> {
        let adapter = self.resolve_adapter(&mut request)?;

        let base: StreamHandler = Arc::new(move |req| {
            let adapter = adapter.clone();
            Box::pin(async move { adapter.stream(req).await })
        });

        let handler = self.middleware.iter().rev().fold(base, |next, middleware| {
            let middleware = middleware.clone();
            Arc::new(move |req| {
                let middleware = middleware.clone();
                let next = next.clone();
                Box::pin(async move { middleware.handle_stream(req, next).await })
            })
        });

        handler(request).await
    }

    fn resolve_adapter(&self, request: &mut Request) -> Result<Arc<dyn ProviderAdapter>, SDKError> {
        let provider_name = match (&request.provider, &self.default_provider) {
            (Some(provider), _) => provider.clone(),
            (None, Some(provider)) => provider.clone(),
            (None, None) => return Err(SDKError::configuration("no provider configured")),
        };
        let adapter = self.providers.get(&provider_name).cloned().ok_or_else(|| {
            SDKError::configuration(format!("provider '{provider_name}' is not registered"))
        })?;
        request.provider = Some(provider_name);
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::replay_response;
    use crate::types::{FinishReason, Message, Usage};
    use std::sync::Mutex;

    struct TestAdapter {
        name: String,
    }

    #[async_trait]
    impl ProviderAdapter for TestAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, request: Request) -> Result<Response, SDKError> {
            Ok(Response {
                id: "resp".to_string(),
                model: request.model,
                provider: self.name.clone(),
                message: Message::assistant("ok"),
                finish_reason: FinishReason::new("stop"),
                usage: Usage::default(),
            })
        }

        async fn stream(&self, request: Request) -> Result<StreamEventStream, SDKError> {
            Ok(replay_response(self.complete(request).await?))
        }
    }

    struct OrderMiddleware {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for OrderMiddleware {
        async fn handle_complete(
            &self,
            request: Request,
            next: CompleteHandler,
        ) -> Result<Response, SDKError> {
            self.log.lock().unwrap().push(self.label);
            let result = next(request).await;
            self.log.lock().unwrap().push(self.label);
            result
        }

        async fn handle_stream(
            &self,
            request: Request,
            next: StreamHandler,
        ) -> Result<StreamEventStream, SDKError> {
            self.log.lock().unwrap().push(self.label);
            let result = next(request).await;
            self.log.lock().unwrap().push(self.label);
            result
        }
    }

    fn adapter(name: &str) -> Arc<TestAdapter> {
        Arc::new(TestAdapter {
            name: name.to_string(),
        })
    }

    #[tokio::test(flavor = "current_thread")]
    async fn middleware_order_is_preserved() {
        let mut client = Client::default();
        client.register_provider(adapter("test")).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        client.add_middleware(Arc::new(OrderMiddleware {
            label: "a",
            log: log.clone(),
        }));
        client.add_middleware(Arc::new(OrderMiddleware {
            label: "b",
            log: log.clone(),
        }));

        let _ = client
            .complete(Request::new("model", vec![Message::user("hi")]))
            .await
            .unwrap();
        let order = log.lock().unwrap().clone();
        assert_eq!(order, vec!["a", "b", "b", "a"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn provider_resolution_prefers_request_provider() {
        let mut client = Client::default();
        client.register_provider(adapter("first")).unwrap();
        client.register_provider(adapter("second")).unwrap();
        assert_eq!(client.default_provider(), Some("first"));

        let mut request = Request::new("model", vec![Message::user("hi")]);
        request.provider = Some("second".to_string());
        let response = client.complete(request).await.unwrap();
        assert_eq!(response.provider, "second");

        let response = client
            .complete(Request::new("model", vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(response.provider, "first");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_provider_is_a_configuration_error() {
        let client = Client::default();
        let error = client
            .complete(Request::new("model", vec![Message::user("hi")]))
            .await
            .expect_err("no adapters registered");
        assert!(error.is_configuration());

        let mut client = Client::default();
        client.register_provider(adapter("test")).unwrap();
        let mut request = Request::new("model", vec![Message::user("hi")]);
        request.provider = Some("missing".to_string());
        let error = client.stream(request).await.err().expect("unknown provider");
        assert!(error.to_string().contains("'missing' is not registered"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut client = Client::default();
        client.register_provider(adapter("test")).unwrap();
        assert!(client.register_provider(adapter("test")).is_err());
        assert!(client.set_default_provider("other").is_err());
    }
}
