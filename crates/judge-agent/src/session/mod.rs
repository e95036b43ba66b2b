use crate::{
    ActionError, ActionRequest, AgentError, CoordinatorProfile, CoordinatorTurn, DispatchOptions,
    EventEmitter, NoopEventEmitter, Observation, ReminderTurn, SessionConfig, SessionEvent, Turn,
    UserTurn, history_to_messages,
};
use judge_llm::{Client, Request, Response, ResponseSeed, SDKError, StreamAccumulator, ToolChoice};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

mod round;
mod runner;
mod types;
pub use round::RoundStream;
pub use types::{RoundOptions, RoundOutcome, SessionState};
use types::RoundProgress;


/// Multi-round review conversation. Owns the history; every round appends to
/// it and nothing ever rewrites it.
pub struct Session {
    id: String,
    profile: CoordinatorProfile,
    client: Arc<Client>,
    history: Vec<Turn>,
    event_emitter: Arc<dyn EventEmitter>,
    config: SessionConfig,
    state: SessionState,
    rounds: usize,
    abort_requested: Arc<AtomicBool>,
    abort_notify: Arc<Notify>,
}

/// Cancels the round in flight from outside the session, e.g. a signal handler.
#[derive(Clone)]
pub struct SessionAbortHandle {
    abort_requested: Arc<AtomicBool>,
    abort_notify: Arc<Notify>,
}

impl SessionAbortHandle {
    pub fn request_abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
        self.abort_notify.notify_waiters();
    }
}

impl Session {
    pub fn start(
        profile: CoordinatorProfile,
        client: Arc<Client>,
        config: SessionConfig,
    ) -> Result<Self, AgentError> {
        Self::start_with_emitter(profile, client, config, Arc::new(NoopEventEmitter))
    }

    pub fn start_with_emitter(
        profile: CoordinatorProfile,
        client: Arc<Client>,
        config: SessionConfig,
        event_emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        if profile.registry().is_empty() {
            return Err(AgentError::invalid_configuration(
                "coordinator profile has no registered actions",
            ));
        }

        let session = Self {
            id: Uuid::new_v4().to_string(),
            profile,
            client,
            history: Vec::new(),
            event_emitter,
            config,
            state: SessionState::Idle,
            rounds: 0,
            abort_requested: Arc::new(AtomicBool::new(false)),
            abort_notify: Arc::new(Notify::new()),
        };
        session
            .event_emitter
            .emit(SessionEvent::session_start(session.id.clone(), session.profile.model()))?;
        tracing::info!(session_id = %session.id, model = session.profile.model(), "review session started");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Rounds started so far, including failed ones.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn abort_handle(&self) -> SessionAbortHandle {
        SessionAbortHandle {
            abort_requested: self.abort_requested.clone(),
            abort_notify: self.abort_notify.clone(),
        }
    }

    pub fn request_abort(&self) {
        self.abort_handle().request_abort();
    }

    pub fn submit_round(&mut self, user_input: impl Into<String>) -> RoundStream<'_> {
        self.submit_round_with_options(user_input, RoundOptions::default())
    }

    /// Starts a round. Nothing happens until the returned stream is polled.
    pub fn submit_round_with_options(
        &mut self,
        user_input: impl Into<String>,
        options: RoundOptions,
    ) -> RoundStream<'_> {
        let (fragments, receiver) = mpsc::unbounded_channel();
        let user_input = user_input.into();
        RoundStream::new(
            receiver,
            Box::pin(self.run_round(user_input, options, fragments)),
        )
    }

    /// Closes the session. Calling it again is a no-op.
    pub fn end(&mut self) -> Result<(), AgentError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.recover_interrupted_round()?;
        self.transition_to(SessionState::Closed)?;
        self.event_emitter
            .emit(SessionEvent::session_end(self.id.clone(), self.rounds))?;
        tracing::info!(session_id = %self.id, rounds = self.rounds, "review session ended");
        Ok(())
    }

    fn transition_to(&mut self, next: SessionState) -> Result<(), AgentError> {
        if !self.state.can_transition_to(&next) {
            return Err(AgentError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    fn is_abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        self.event_emitter.emit(event)
    }
}

async fn wait_for_abort(abort_requested: &AtomicBool, abort_notify: &Notify) {
    loop {
        let notified = abort_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if abort_requested.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}
