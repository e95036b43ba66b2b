use super::*;
use futures::StreamExt;
use tracing::Instrument;

const INTERRUPTED_MESSAGE: &str = "not executed: the round was interrupted";
const ABORTED_MESSAGE: &str = "not executed: the round was aborted";

impl Session {
    pub(super) async fn run_round(
        &mut self,
        user_input: String,
        options: RoundOptions,
        fragments: mpsc::UnboundedSender<String>,
    ) -> Result<RoundOutcome, AgentError> {
        if self.state == SessionState::Closed {
            return Err(AgentError::SessionClosed);
        }
        self.recover_interrupted_round()?;

        // An abort requested between rounds must not cancel the next one.
        self.abort_requested.store(false, Ordering::SeqCst);
        self.transition_to(SessionState::Processing)?;
        self.rounds += 1;
        let round = self.rounds;
        self.emit(SessionEvent::round_start(self.id.clone(), round))?;

        let mut progress = RoundProgress {
            history_start: self.history.len(),
            ..Default::default()
        };
        let span = tracing::info_span!("round", session_id = %self.id, round);
        let result = self
            .drive_round(user_input, &options, &mut progress, &fragments)
            .instrument(span)
            .await;

        self.transition_to(SessionState::Idle)?;
        self.emit(SessionEvent::round_end(
            self.id.clone(),
            round,
            progress.cycles,
            result.as_ref().err().map(ToString::to_string),
        ))?;
        result?;

        Ok(RoundOutcome {
            round,
            final_text: progress.final_text,
            action_cycles: progress.cycles,
            observations: progress.observations,
            error_observations: progress.error_observations,
            usage: progress.usage,
            missing_actions: progress.missing_actions,
        })
    }

    async fn drive_round(
        &mut self,
        user_input: String,
        options: &RoundOptions,
        progress: &mut RoundProgress,
        fragments: &mpsc::UnboundedSender<String>,
    ) -> Result<(), AgentError> {
        self.history.push(Turn::User(UserTurn::new(user_input)));

        loop {
            if self.is_abort_requested() {
                return Err(AgentError::Aborted);
            }

            let request = self.build_request();
            tracing::debug!(
                messages = request.messages.len(),
                cycle = progress.cycles,
                "coordinator reasoning"
            );
            let separate = progress.emitted_text;
            let reasoned = tokio::select! {
                result = self.reason(request, fragments, separate) => Some(result),
                _ = wait_for_abort(&self.abort_requested, &self.abort_notify) => None,
            };
            let response = match reasoned {
                Some(Ok(response)) => response,
                Some(Err(error)) => {
                    self.emit(SessionEvent::error(self.id.clone(), error.to_string()))?;
                    tracing::warn!(%error, "coordinator model call failed");
                    return Err(error);
                }
                None => return Err(AgentError::Aborted),
            };

            let text = response.text();
            let mut requests: Vec<ActionRequest> = response
                .tool_calls()
                .into_iter()
                .map(ActionRequest::from)
                .collect();
            ensure_unique_request_ids(&mut requests);
            progress.emitted_text |= !text.is_empty();
            progress.usage = progress.usage.clone() + response.usage.clone();
            let mut turn = CoordinatorTurn::new(text.clone(), requests.clone(), response.usage);
            turn.response_id = Some(response.id).filter(|id| !id.is_empty());
            self.history.push(Turn::Coordinator(turn));

            if requests.is_empty() {
                let missing = self.missing_required_actions(options, progress.history_start);
                if !missing.is_empty() && progress.reminders_sent < self.config.completeness_reminders
                {
                    progress.reminders_sent += 1;
                    self.emit(SessionEvent::completeness_reminder(self.id.clone(), &missing))?;
                    tracing::info!(missing = ?missing, "coordinator concluded early; sending reminder");
                    self.history
                        .push(Turn::Reminder(ReminderTurn::new(completeness_reminder(&missing))));
                    continue;
                }
                if !missing.is_empty() {
                    self.emit(SessionEvent::warning(
                        self.id.clone(),
                        format!(
                            "round concluded without required actions: {}",
                            missing.join(", ")
                        ),
                    ))?;
                }
                progress.final_text = text;
                progress.missing_actions = missing;
                return Ok(());
            }

            let limit = self.config.max_action_cycles_per_round;
            if progress.cycles >= limit {
                let reason = format!("not executed: the round exceeded its budget of {limit} action cycles");
                self.append_cancelled_observations(&requests, &reason, progress);
                self.emit(SessionEvent::loop_budget_exceeded(self.id.clone(), limit))?;
                tracing::warn!(limit, "action cycle budget exhausted");
                return Err(AgentError::LoopBudgetExceeded { limit });
            }
            progress.cycles += 1;

            let registry = self.profile.registry();
            let dispatch_options = DispatchOptions {
                session_id: self.id.clone(),
                parallel: self.config.parallel_actions,
                timeout: self.config.action_timeout(),
            };
            let dispatched = tokio::select! {
                result = registry.dispatch(&requests, self.event_emitter.clone(), &dispatch_options) => Some(result),
                _ = wait_for_abort(&self.abort_requested, &self.abort_notify) => None,
            };
            let outcomes = match dispatched {
                Some(Ok(outcomes)) => outcomes,
                Some(Err(error)) => {
                    self.append_cancelled_observations(&requests, &error.to_string(), progress);
                    return Err(error);
                }
                None => {
                    self.append_cancelled_observations(&requests, ABORTED_MESSAGE, progress);
                    return Err(AgentError::Aborted);
                }
            };

            for outcome in outcomes {
                let observation =
                    Observation::from_result(outcome.request_id, outcome.action_name, outcome.result);
                self.record_observation(observation, progress);
            }
        }
    }

    /// One Reason step: streams the coordinator's reply, forwarding text as it
    /// arrives.
    async fn reason(
        &self,
        request: Request,
        fragments: &mpsc::UnboundedSender<String>,
        separate: bool,
    ) -> Result<Response, AgentError> {
        let mut stream = self.client.stream(request).await?;
        let mut accumulator = StreamAccumulator::new(ResponseSeed {
            id: String::new(),
            model: self.profile.model().to_string(),
            provider: self.profile.provider().unwrap_or_default().to_string(),
        });
        let mut needs_separator = separate;

        while let Some(event) = stream.next().await {
            let event = event?;
            if let Some(delta) = accumulator.process(&event) {
                if needs_separator {
                    needs_separator = false;
                    let _ = fragments.send("\n\n".to_string());
                }
                self.emit(SessionEvent::coordinator_text_delta(self.id.clone(), delta.clone()))?;
                // The receiver lives as long as this future does.
                let _ = fragments.send(delta);
            }
            if let Some(error) = accumulator.error() {
                return Err(SDKError::Stream(error.to_string()).into());
            }
        }
        Ok(accumulator.response())
    }

    pub(super) fn build_request(&self) -> Request {
        let mut messages = vec![judge_llm::Message::system(self.profile.system_prompt())];
        messages.extend(history_to_messages(&self.history));

        let tools = self.profile.tools();
        let mut request = Request::new(self.profile.model(), messages);
        request.provider = self.profile.provider().map(str::to_string);
        if !tools.is_empty() {
            request.tools = Some(tools);
            request.tool_choice = Some(ToolChoice::auto());
        }
        request.max_tokens = Some(self.config.max_tokens);
        request.temperature = self.config.temperature;
        request
    }

    fn missing_required_actions(&self, options: &RoundOptions, history_start: usize) -> Vec<String> {
        let round_turns = &self.history[history_start..];
        options
            .required_actions
            .iter()
            .filter(|name| {
                !round_turns.iter().any(|turn| {
                    matches!(turn, Turn::Observation(observation)
                        if observation.action_name == **name && !observation.is_error)
                })
            })
            .cloned()
            .collect()
    }

    fn record_observation(&mut self, observation: Observation, progress: &mut RoundProgress) {
        progress.observations += 1;
        if observation.is_error {
            progress.error_observations += 1;
        }
        self.history.push(Turn::Observation(observation));
    }

    fn append_cancelled_observations(
        &mut self,
        requests: &[ActionRequest],
        reason: &str,
        progress: &mut RoundProgress,
    ) {
        for request in requests {
            let observation = Observation::from_result(
                &request.id,
                &request.action_name,
                Err(ActionError::cancelled(&request.action_name, reason)),
            );
            self.record_observation(observation, progress);
        }
    }

    /// Repairs history after a round whose stream was dropped mid-flight, so
    /// every request still gets exactly one observation.
    pub(super) fn recover_interrupted_round(&mut self) -> Result<(), AgentError> {
        if self.state != SessionState::Processing {
            return Ok(());
        }

        let last_coordinator = self
            .history
            .iter()
            .rposition(|turn| matches!(turn, Turn::Coordinator(_)));
        if let Some(index) = last_coordinator {
            let answered: Vec<String> = self.history[index + 1..]
                .iter()
                .filter_map(|turn| match turn {
                    Turn::Observation(observation) => Some(observation.request_id.clone()),
                    _ => None,
                })
                .collect();
            let pending: Vec<ActionRequest> = self.history[index]
                .requests()
                .iter()
                .filter(|request| !answered.contains(&request.id))
                .cloned()
                .collect();
            let mut progress = RoundProgress::default();
            self.append_cancelled_observations(&pending, INTERRUPTED_MESSAGE, &mut progress);
        }

        self.transition_to(SessionState::Idle)?;
        self.emit(SessionEvent::warning(
            self.id.clone(),
            format!("round {} was interrupted before it finished", self.rounds),
        ))?;
        Ok(())
    }
}

/// Observations are correlated by request id, so empty or repeated ids are
/// replaced before the coordinator turn is recorded.
fn ensure_unique_request_ids(requests: &mut [ActionRequest]) {
    let mut seen = std::collections::HashSet::new();
    for (position, request) in requests.iter_mut().enumerate() {
        if !request.id.is_empty() && seen.insert(request.id.clone()) {
            continue;
        }
        let base = if request.id.is_empty() {
            "call".to_string()
        } else {
            request.id.clone()
        };
        let mut candidate = format!("{base}_{position}");
        while seen.contains(&candidate) {
            candidate.push('_');
        }
        tracing::warn!(
            original = %request.id,
            renamed = %candidate,
            "renaming duplicate action request id"
        );
        seen.insert(candidate.clone());
        request.id = candidate;
    }
}

fn completeness_reminder(missing: &[String]) -> String {
    format!(
        "You have not yet called: {}. Call each of them with the full diff and any gathered context before writing the final review.",
        missing.join(", ")
    )
}
