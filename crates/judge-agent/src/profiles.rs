use crate::ActionRegistry;
use crate::prompts::judge_prompt;
use judge_llm::ToolDefinition;
use std::sync::Arc;

/// What the coordinator runs on: provider, model, instructions and the
/// actions it may request.
#[derive(Clone)]
pub struct CoordinatorProfile {
    provider: Option<String>,
    model: String,
    system_prompt: String,
    registry: Arc<ActionRegistry>,
}

impl CoordinatorProfile {
    pub fn new(model: impl Into<String>, registry: Arc<ActionRegistry>) -> Self {
        Self {
            provider: None,
            model: model.into(),
            system_prompt: judge_prompt(None),
            registry,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn registry(&self) -> Arc<ActionRegistry> {
        self.registry.clone()
    }

    pub fn tools(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }
}
