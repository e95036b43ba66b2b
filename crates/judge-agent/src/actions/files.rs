use super::{FIND_FILE_ACTION, READ_FILE_ACTION, RegisteredAction, SideEffectClass, required_string_argument};
use crate::RepositoryAccessor;
use judge_llm::ToolDefinition;
use serde_json::json;
use std::sync::Arc;

pub(super) fn read_file_action(repository: Arc<dyn RepositoryAccessor>) -> RegisteredAction {
    RegisteredAction {
        definition: ToolDefinition {
            name: READ_FILE_ACTION.to_string(),
            description: "Read a file in the repository. The path is relative to the repository root."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["file_path"],
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path relative to the repository root"
                    }
                },
                "additionalProperties": false
            }),
        },
        side_effect: SideEffectClass::ReadOnlyFs,
        executor: Arc::new(move |args| {
            let repository = repository.clone();
            Box::pin(async move {
                let file_path = required_string_argument(&args, "file_path")?;
                Ok(repository.read_file(&file_path).await?)
            })
        }),
    }
}

pub(super) fn find_file_action(repository: Arc<dyn RepositoryAccessor>) -> RegisteredAction {
    RegisteredAction {
        definition: ToolDefinition {
            name: FIND_FILE_ACTION.to_string(),
            description: "Search the repository for files with exactly this name (e.g. 'AGENTS.md')."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["filename"],
                "properties": {
                    "filename": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
        side_effect: SideEffectClass::ReadOnlyFs,
        executor: Arc::new(move |args| {
            let repository = repository.clone();
            Box::pin(async move {
                let filename = required_string_argument(&args, "filename")?;
                Ok(repository.find_file(&filename).await?)
            })
        }),
    }
}
