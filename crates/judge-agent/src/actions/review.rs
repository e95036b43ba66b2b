use super::{RegisteredAction, SideEffectClass, required_string_argument};
use crate::Specialist;
use judge_llm::ToolDefinition;
use serde_json::json;
use std::sync::Arc;

pub(super) fn review_action(name: &str, specialist: Arc<Specialist>) -> RegisteredAction {
    RegisteredAction {
        definition: ToolDefinition {
            name: name.to_string(),
            description: format!(
                "Ask the {} to analyze code changes. Pass the full diff and any relevant context.",
                specialist.kind().display_name()
            ),
            parameters: json!({
                "type": "object",
                "required": ["context"],
                "properties": {
                    "context": {
                        "type": "string",
                        "description": "The diff and supporting context to review"
                    }
                },
                "additionalProperties": false
            }),
        },
        side_effect: SideEffectClass::ModelCall,
        executor: Arc::new(move |args| {
            let specialist = specialist.clone();
            Box::pin(async move {
                let context = required_string_argument(&args, "context")?;
                Ok(specialist.review(&context).await)
            })
        }),
    }
}
