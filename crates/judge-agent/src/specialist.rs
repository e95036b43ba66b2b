use crate::prompts::{quality_prompt, security_prompt};
use judge_llm::{Client, Message, Request};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistKind {
    Quality,
    Security,
}

impl SpecialistKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Security => "security",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Quality => "Code Quality Reviewer",
            Self::Security => "Security & Performance Reviewer",
        }
    }

    pub fn system_prompt(&self, notes: Option<&str>) -> String {
        match self {
            Self::Quality => quality_prompt(notes),
            Self::Security => security_prompt(notes),
        }
    }
}

/// A single-call reviewer. It has no tools and no memory between calls.
#[derive(Clone)]
pub struct Specialist {
    kind: SpecialistKind,
    client: Arc<Client>,
    provider: Option<String>,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    system_prompt: String,
}

impl Specialist {
    pub fn new(kind: SpecialistKind, client: Arc<Client>, model: impl Into<String>) -> Self {
        Self {
            kind,
            client,
            provider: None,
            model: model.into(),
            max_tokens: None,
            temperature: None,
            system_prompt: kind.system_prompt(None),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.system_prompt = self.kind.system_prompt(notes);
        self
    }

    pub fn kind(&self) -> SpecialistKind {
        self.kind
    }

    /// Reviews `context`. Model failures come back as report text so a
    /// broken specialist degrades the round instead of ending it.
    pub async fn review(&self, context: &str) -> String {
        let started = std::time::Instant::now();
        match self.request_review(context).await {
            Ok(report) => {
                tracing::debug!(
                    specialist = self.kind.label(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    report_chars = report.len(),
                    "specialist review finished"
                );
                report
            }
            Err(error) => {
                tracing::warn!(specialist = self.kind.label(), %error, "specialist review failed");
                format!("Error during {} review: {error}", self.kind.label())
            }
        }
    }

    async fn request_review(&self, context: &str) -> Result<String, judge_llm::SDKError> {
        let mut request = Request::new(
            self.model.clone(),
            vec![
                Message::system(self.system_prompt.clone()),
                Message::user(context.to_string()),
            ],
        );
        request.provider = self.provider.clone();
        request.max_tokens = self.max_tokens;
        request.temperature = self.temperature;
        let response = self.client.complete(request).await?;
        Ok(response.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptStep, scripted_client, text_response};
    use judge_llm::{Role, SDKError};

    #[tokio::test(flavor = "current_thread")]
    async fn review_sends_one_isolated_call() {
        let (client, adapter) =
            scripted_client(vec![ScriptStep::Respond(text_response("## Summary\nNo issues."))]);
        let specialist = Specialist::new(SpecialistKind::Security, client, "reviewer-model")
            .with_max_tokens(1024)
            .with_notes(Some("Swift iOS app"));

        let report = specialist.review("diff --git a/Foo.swift b/Foo.swift").await;

        assert_eq!(report, "## Summary\nNo issues.");
        let requests = adapter.requests.lock().expect("requests");
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "reviewer-model");
        assert_eq!(request.max_tokens, Some(1024));
        assert!(request.tools.is_none());
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].text().contains("Swift iOS app"));
        assert_eq!(request.messages[1].text(), "diff --git a/Foo.swift b/Foo.swift");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn model_failure_is_returned_as_report_text() {
        let (client, _adapter) = scripted_client(vec![ScriptStep::Fail(SDKError::Network(
            "connection refused".to_string(),
        ))]);
        let specialist = Specialist::new(SpecialistKind::Quality, client, "reviewer-model");

        let report = specialist.review("some diff").await;

        assert_eq!(
            report,
            "Error during quality review: network error: connection refused"
        );
    }
}
