use crate::{
    ActionError, ActionRequest, AgentError, EventEmitter, SessionEvent, validate_arguments,
};
use futures::future::join_all;
use judge_llm::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type ActionFuture = Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send>>;
pub type ActionExecutor = Arc<dyn Fn(Value) -> ActionFuture + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectClass {
    ReadOnlyRepo,
    ReadOnlyFs,
    ModelCall,
}

#[derive(Clone)]
pub struct RegisteredAction {
    pub definition: ToolDefinition,
    pub side_effect: SideEffectClass,
    pub executor: ActionExecutor,
}

impl RegisteredAction {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

#[derive(Clone, Debug)]
pub struct DispatchOptions {
    pub session_id: String,
    pub parallel: bool,
    pub timeout: Option<Duration>,
}

/// The structured result of one dispatched request. It becomes an
/// observation only when appended to history.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub request_id: String,
    pub action_name: String,
    pub result: Result<String, ActionError>,
    pub duration_ms: u128,
}

#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
}

impl ActionRegistry {
    pub fn register(&mut self, action: RegisteredAction) -> Result<(), ActionError> {
        let name = action.definition.name.clone();
        if self.actions.contains_key(&name) {
            return Err(ActionError::duplicate(name));
        }
        self.actions.insert(name, action);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&RegisteredAction, ActionError> {
        self.actions
            .get(name)
            .ok_or_else(|| ActionError::unknown(name))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .actions
            .values()
            .map(|action| action.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Resolves, validates and runs one request. Never panics on bad input;
    /// every failure comes back as an [`ActionError`].
    pub async fn execute(
        &self,
        request: &ActionRequest,
        timeout: Option<Duration>,
    ) -> Result<String, ActionError> {
        let action = self.resolve(&request.action_name)?;
        let arguments = request.parsed_arguments()?;
        validate_arguments(&action.definition.parameters, &arguments)
            .map_err(|message| ActionError::validation(request.action_name.clone(), message))?;

        let run = (action.executor)(arguments);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ActionError::timeout(
                        request.action_name.clone(),
                        limit.as_millis() as u64,
                    ));
                }
            },
            None => run.await,
        };
        result.map_err(|error| ActionError::from_agent_error(request.action_name.clone(), error))
    }

    /// Runs every request and returns outcomes in request order. Only event
    /// emission failures are returned as `Err`.
    pub async fn dispatch(
        &self,
        requests: &[ActionRequest],
        event_emitter: Arc<dyn EventEmitter>,
        options: &DispatchOptions,
    ) -> Result<Vec<ActionOutcome>, AgentError> {
        if options.parallel && requests.len() > 1 {
            let pending: Vec<_> = requests
                .iter()
                .map(|request| self.dispatch_single(request, event_emitter.as_ref(), options))
                .collect();
            return join_all(pending).await.into_iter().collect();
        }

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(
                self.dispatch_single(request, event_emitter.as_ref(), options)
                    .await?,
            );
        }
        Ok(outcomes)
    }

    async fn dispatch_single(
        &self,
        request: &ActionRequest,
        event_emitter: &dyn EventEmitter,
        options: &DispatchOptions,
    ) -> Result<ActionOutcome, AgentError> {
        let started = Instant::now();
        event_emitter.emit(SessionEvent::action_start(
            options.session_id.clone(),
            &request.id,
            &request.action_name,
            request.parsed_arguments().ok(),
        ))?;

        let result = self.execute(request, options.timeout).await;
        let duration_ms = started.elapsed().as_millis();
        event_emitter.emit(SessionEvent::action_end(
            options.session_id.clone(),
            &request.id,
            &request.action_name,
            duration_ms,
            result.as_ref().err().map(ToString::to_string),
        ))?;

        Ok(ActionOutcome {
            request_id: request.id.clone(),
            action_name: request.action_name.clone(),
            result,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionErrorKind, BufferedEventEmitter, EventKind, NoopEventEmitter};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn echo_action(name: &str, executor: ActionExecutor) -> RegisteredAction {
        RegisteredAction {
            definition: ToolDefinition {
                name: name.to_string(),
                description: "echo".to_string(),
                parameters: json!({
                    "type": "object",
                    "required": ["value"],
                    "properties": {
                        "value": { "type": "string" },
                        "delay_ms": { "type": "integer" }
                    },
                    "additionalProperties": false
                }),
            },
            side_effect: SideEffectClass::ReadOnlyFs,
            executor,
        }
    }

    fn echo_executor() -> ActionExecutor {
        Arc::new(|args| {
            Box::pin(async move {
                let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
                if delay > 0 {
                    sleep(Duration::from_millis(delay)).await;
                }
                Ok(args
                    .get("value")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string())
            })
        })
    }

    fn options(parallel: bool) -> DispatchOptions {
        DispatchOptions {
            session_id: "session-1".to_string(),
            parallel,
            timeout: None,
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ActionRegistry::default();
        registry
            .register(echo_action("echo", echo_executor()))
            .expect("first registration");
        let error = registry
            .register(echo_action("echo", echo_executor()))
            .expect_err("duplicate");
        assert_eq!(error.kind, ActionErrorKind::DuplicateAction);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let mut registry = ActionRegistry::default();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(echo_action(name, echo_executor()))
                .expect("register");
        }
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.names(), names);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_action_becomes_error_outcome() {
        let registry = ActionRegistry::default();
        let outcomes = registry
            .dispatch(
                &[ActionRequest::new("call-1", "get_difff", json!({}))],
                Arc::new(NoopEventEmitter),
                &options(false),
            )
            .await
            .expect("dispatch should not fail");

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].request_id, "call-1");
        let error = outcomes[0].result.as_ref().expect_err("unknown action");
        assert_eq!(error.kind, ActionErrorKind::UnknownAction);
        assert!(error.to_string().contains("Error executing action 'get_difff'"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn validation_failure_skips_execution() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let executor: ActionExecutor = Arc::new(move |_args| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("ran".to_string())
            })
        });
        let mut registry = ActionRegistry::default();
        registry
            .register(echo_action("echo", executor))
            .expect("register");

        let missing = registry
            .execute(&ActionRequest::new("c1", "echo", json!({})), None)
            .await
            .expect_err("missing field");
        assert_eq!(missing.kind, ActionErrorKind::Validation);
        assert!(missing.message.contains("missing required argument 'value'"));

        let ill_typed = registry
            .execute(&ActionRequest::new("c2", "echo", json!({"value": 7})), None)
            .await
            .expect_err("wrong type");
        assert!(ill_typed.message.contains("expected type 'string'"));

        let mut raw = ActionRequest::new("c3", "echo", Value::Null);
        raw.raw_arguments = Some("{\"value\": ".to_string());
        let malformed = registry.execute(&raw, None).await.expect_err("bad json");
        assert_eq!(malformed.kind, ActionErrorKind::Validation);

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn executor_errors_are_captured() {
        let executor: ActionExecutor = Arc::new(|_args| {
            Box::pin(async move { Err::<String, _>(AgentError::invalid_configuration("boom")) })
        });
        let mut registry = ActionRegistry::default();
        registry
            .register(echo_action("echo", executor))
            .expect("register");

        let error = registry
            .execute(&ActionRequest::new("c", "echo", json!({"value": "x"})), None)
            .await
            .expect_err("executor failure");
        assert_eq!(error.kind, ActionErrorKind::Execution);
        assert_eq!(
            error.to_string(),
            "Error executing action 'echo': invalid configuration: boom"
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn slow_actions_time_out() {
        let mut registry = ActionRegistry::default();
        registry
            .register(echo_action("echo", echo_executor()))
            .expect("register");

        let error = registry
            .execute(
                &ActionRequest::new("c", "echo", json!({"value": "x", "delay_ms": 5_000})),
                Some(Duration::from_millis(50)),
            )
            .await
            .expect_err("timeout");
        assert_eq!(error.kind, ActionErrorKind::Timeout);
        assert!(error.message.contains("50 ms"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn parallel_dispatch_keeps_request_order() {
        let mut registry = ActionRegistry::default();
        registry
            .register(echo_action("echo", echo_executor()))
            .expect("register");
        let requests = vec![
            ActionRequest::new("a", "echo", json!({"value": "a", "delay_ms": 80})),
            ActionRequest::new("b", "echo", json!({"value": "b", "delay_ms": 10})),
            ActionRequest::new("c", "echo", json!({"value": "c", "delay_ms": 40})),
        ];

        let started = Instant::now();
        let outcomes = registry
            .dispatch(&requests, Arc::new(NoopEventEmitter), &options(true))
            .await
            .expect("dispatch");
        let elapsed = started.elapsed();

        let ids: Vec<&str> = outcomes.iter().map(|o| o.request_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let outputs: Vec<&str> = outcomes
            .iter()
            .map(|o| o.result.as_deref().expect("ok"))
            .collect();
        assert_eq!(outputs, vec!["a", "b", "c"]);
        assert!(elapsed < Duration::from_millis(120));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dispatch_emits_start_and_end_events() {
        let mut registry = ActionRegistry::default();
        registry
            .register(echo_action("echo", echo_executor()))
            .expect("register");
        let emitter = Arc::new(BufferedEventEmitter::default());

        registry
            .dispatch(
                &[ActionRequest::new("call-1", "echo", json!({"value": "done"}))],
                emitter.clone(),
                &options(false),
            )
            .await
            .expect("dispatch");

        let events = emitter.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::ActionStart);
        assert_eq!(events[0].data.get_str("request_id"), Some("call-1"));
        assert_eq!(events[1].kind, EventKind::ActionEnd);
        assert_eq!(events[1].data.get_bool("is_error"), Some(false));
    }
}
