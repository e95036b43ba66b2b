use super::{
    GET_BRANCHES_ACTION, GET_CHANGED_FILES_ACTION, GET_DIFF_ACTION, RegisteredAction,
    SideEffectClass, required_string_argument,
};
use crate::RepositoryAccessor;
use judge_llm::ToolDefinition;
use serde_json::{Value, json};
use std::sync::Arc;

fn branch_pair_schema() -> Value {
    json!({
        "type": "object",
        "required": ["source_branch", "target_branch"],
        "properties": {
            "source_branch": {
                "type": "string",
                "description": "The branch containing the changes"
            },
            "target_branch": {
                "type": "string",
                "description": "The branch to compare against (e.g. main)"
            }
        },
        "additionalProperties": false
    })
}

pub(super) fn get_diff_action(repository: Arc<dyn RepositoryAccessor>) -> RegisteredAction {
    RegisteredAction {
        definition: ToolDefinition {
            name: GET_DIFF_ACTION.to_string(),
            description: "Get the unified diff between two git branches.".to_string(),
            parameters: branch_pair_schema(),
        },
        side_effect: SideEffectClass::ReadOnlyRepo,
        executor: Arc::new(move |args| {
            let repository = repository.clone();
            Box::pin(async move {
                let source = required_string_argument(&args, "source_branch")?;
                let target = required_string_argument(&args, "target_branch")?;
                Ok(repository.diff(&source, &target).await?)
            })
        }),
    }
}

pub(super) fn get_changed_files_action(
    repository: Arc<dyn RepositoryAccessor>,
) -> RegisteredAction {
    RegisteredAction {
        definition: ToolDefinition {
            name: GET_CHANGED_FILES_ACTION.to_string(),
            description: "List the files changed between two branches.".to_string(),
            parameters: branch_pair_schema(),
        },
        side_effect: SideEffectClass::ReadOnlyRepo,
        executor: Arc::new(move |args| {
            let repository = repository.clone();
            Box::pin(async move {
                let source = required_string_argument(&args, "source_branch")?;
                let target = required_string_argument(&args, "target_branch")?;
                Ok(repository.changed_files(&source, &target).await?)
            })
        }),
    }
}

pub(super) fn get_branches_action(repository: Arc<dyn RepositoryAccessor>) -> RegisteredAction {
    RegisteredAction {
        definition: ToolDefinition {
            name: GET_BRANCHES_ACTION.to_string(),
            description: "List all local and remote git branches.".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
        side_effect: SideEffectClass::ReadOnlyRepo,
        executor: Arc::new(move |_args| {
            let repository = repository.clone();
            Box::pin(async move { Ok(repository.list_branches().await?) })
        }),
    }
}
