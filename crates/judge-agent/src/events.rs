use crate::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    SessionEnd,
    RoundStart,
    RoundEnd,
    CoordinatorTextDelta,
    ActionStart,
    ActionEnd,
    CompletenessReminder,
    LoopBudgetExceeded,
    Warning,
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(Map<String, Value>);

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub timestamp: String,
    pub session_id: String,
    pub data: EventData,
}

impl SessionEvent {
    pub fn new(kind: EventKind, session_id: impl Into<String>, data: EventData) -> Self {
        Self {
            kind,
            timestamp: current_timestamp(),
            session_id: session_id.into(),
            data,
        }
    }

    pub fn session_start(session_id: impl Into<String>, model: &str) -> Self {
        Self::new(
            EventKind::SessionStart,
            session_id,
            EventData::new().with("model", model),
        )
    }

    pub fn session_end(session_id: impl Into<String>, rounds: usize) -> Self {
        Self::new(
            EventKind::SessionEnd,
            session_id,
            EventData::new().with("rounds", rounds),
        )
    }

    pub fn round_start(session_id: impl Into<String>, round: usize) -> Self {
        Self::new(
            EventKind::RoundStart,
            session_id,
            EventData::new().with("round", round),
        )
    }

    pub fn round_end(
        session_id: impl Into<String>,
        round: usize,
        action_cycles: usize,
        error: Option<String>,
    ) -> Self {
        let mut data = EventData::new()
            .with("round", round)
            .with("action_cycles", action_cycles)
            .with("ok", error.is_none());
        if let Some(error) = error {
            data = data.with("error", error);
        }
        Self::new(EventKind::RoundEnd, session_id, data)
    }

    pub fn coordinator_text_delta(session_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::new(
            EventKind::CoordinatorTextDelta,
            session_id,
            EventData::new().with("delta", delta.into()),
        )
    }

    pub fn action_start(
        session_id: impl Into<String>,
        request_id: &str,
        action_name: &str,
        arguments: Option<Value>,
    ) -> Self {
        let mut data = EventData::new()
            .with("request_id", request_id)
            .with("action_name", action_name);
        if let Some(arguments) = arguments {
            data = data.with("arguments", arguments);
        }
        Self::new(EventKind::ActionStart, session_id, data)
    }

    pub fn action_end(
        session_id: impl Into<String>,
        request_id: &str,
        action_name: &str,
        duration_ms: u128,
        error: Option<String>,
    ) -> Self {
        let mut data = EventData::new()
            .with("request_id", request_id)
            .with("action_name", action_name)
            .with("duration_ms", duration_ms as u64)
            .with("is_error", error.is_some());
        if let Some(error) = error {
            data = data.with("error", error);
        }
        Self::new(EventKind::ActionEnd, session_id, data)
    }

    pub fn completeness_reminder(session_id: impl Into<String>, missing: &[String]) -> Self {
        Self::new(
            EventKind::CompletenessReminder,
            session_id,
            EventData::new().with("missing_actions", missing.to_vec()),
        )
    }

    pub fn loop_budget_exceeded(session_id: impl Into<String>, limit: usize) -> Self {
        Self::new(
            EventKind::LoopBudgetExceeded,
            session_id,
            EventData::new().with("limit", limit),
        )
    }

    pub fn warning(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            EventKind::Warning,
            session_id,
            EventData::new().with("message", message.into()),
        )
    }

    pub fn error(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            EventKind::Error,
            session_id,
            EventData::new().with("message", message.into()),
        )
    }
}

pub(crate) fn current_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}

pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError>;
}

#[derive(Default)]
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: SessionEvent) -> Result<(), AgentError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct BufferedEventEmitter {
    inner: Arc<Mutex<Vec<SessionEvent>>>,
}

impl BufferedEventEmitter {
    pub fn snapshot(&self) -> Vec<SessionEvent> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.snapshot().into_iter().map(|event| event.kind).collect()
    }
}

impl EventEmitter for BufferedEventEmitter {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Forwards session events to `tracing`. Text deltas are logged at trace
/// level since they arrive once per token.
#[derive(Default)]
pub struct TracingEventEmitter;

impl EventEmitter for TracingEventEmitter {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        let session_id = event.session_id.as_str();
        let data = &event.data;
        match event.kind {
            EventKind::CoordinatorTextDelta => {
                tracing::trace!(session_id, delta = data.get_str("delta"), "coordinator text");
            }
            EventKind::ActionStart => tracing::debug!(
                session_id,
                request_id = data.get_str("request_id"),
                action = data.get_str("action_name"),
                "action started"
            ),
            EventKind::ActionEnd => tracing::info!(
                session_id,
                request_id = data.get_str("request_id"),
                action = data.get_str("action_name"),
                duration_ms = data.get_u64("duration_ms"),
                is_error = data.get_bool("is_error"),
                "action finished"
            ),
            EventKind::Warning | EventKind::CompletenessReminder | EventKind::LoopBudgetExceeded => {
                tracing::warn!(session_id, kind = ?event.kind, data = ?data, "session warning");
            }
            EventKind::Error => {
                tracing::error!(session_id, message = data.get_str("message"), "session error");
            }
            kind => tracing::info!(session_id, kind = ?kind, data = ?data, "session event"),
        }
        Ok(())
    }
}

/// Fans one event out to several emitters.
pub struct FanoutEventEmitter {
    emitters: Vec<Arc<dyn EventEmitter>>,
}

impl FanoutEventEmitter {
    pub fn new(emitters: Vec<Arc<dyn EventEmitter>>) -> Self {
        Self { emitters }
    }
}

impl EventEmitter for FanoutEventEmitter {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        for emitter in &self.emitters {
            emitter.emit(event.clone())?;
        }
        Ok(())
    }
}
