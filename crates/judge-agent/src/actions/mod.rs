mod files;
mod git;
mod registry;
mod review;

use crate::{ActionError, RepositoryAccessor, Specialist};
use serde_json::Value;
use std::sync::Arc;

pub use registry::{
    ActionExecutor, ActionFuture, ActionOutcome, ActionRegistry, DispatchOptions,
    RegisteredAction, SideEffectClass,
};

pub const GET_DIFF_ACTION: &str = "get_diff";
pub const GET_CHANGED_FILES_ACTION: &str = "get_changed_files";
pub const GET_BRANCHES_ACTION: &str = "get_branches";
pub const READ_FILE_ACTION: &str = "read_file";
pub const FIND_FILE_ACTION: &str = "find_file";
pub const QUALITY_REVIEW_ACTION: &str = "quality_review";
pub const SECURITY_REVIEW_ACTION: &str = "security_review";

/// Both specialist actions; the initial review round requires them.
pub const SPECIALIST_ACTIONS: [&str; 2] = [QUALITY_REVIEW_ACTION, SECURITY_REVIEW_ACTION];

/// Builds the full review action set: three git queries, two file queries
/// and the two specialists.
pub fn build_review_registry(
    repository: Arc<dyn RepositoryAccessor>,
    quality: Arc<Specialist>,
    security: Arc<Specialist>,
) -> Result<ActionRegistry, ActionError> {
    let mut registry = ActionRegistry::default();
    registry.register(git::get_diff_action(repository.clone()))?;
    registry.register(git::get_changed_files_action(repository.clone()))?;
    registry.register(git::get_branches_action(repository.clone()))?;
    registry.register(files::read_file_action(repository.clone()))?;
    registry.register(files::find_file_action(repository))?;
    registry.register(review::review_action(QUALITY_REVIEW_ACTION, quality))?;
    registry.register(review::review_action(SECURITY_REVIEW_ACTION, security))?;
    Ok(registry)
}

fn required_string_argument(arguments: &Value, key: &str) -> Result<String, ActionError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ActionError::validation("", format!("missing required string argument '{key}'"))
        })
}

/// Checks arguments against the subset of JSON Schema the actions declare:
/// an object root, `required`, per-property `type`, `additionalProperties`.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let object = arguments
        .as_object()
        .ok_or_else(|| "action arguments must be a JSON object".to_string())?;
    let schema_object = schema
        .as_object()
        .ok_or_else(|| "action schema root must be a JSON object".to_string())?;

    if let Some(required) = schema_object.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(format!("missing required argument '{key}'"));
            }
        }
    }

    let empty = serde_json::Map::new();
    let properties = schema_object
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let additional_allowed = schema_object
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    for (key, value) in object {
        let Some(property) = properties.get(key) else {
            if additional_allowed {
                continue;
            }
            return Err(format!("unexpected argument '{key}'"));
        };
        let Some(type_name) = property.get("type").and_then(Value::as_str) else {
            continue;
        };
        let valid = match type_name {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            "null" => value.is_null(),
            _ => true,
        };
        if !valid {
            return Err(format!(
                "argument '{key}' expected type '{type_name}' but received '{}'",
                json_type_name(value)
            ));
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_accepts_matching_arguments() {
        let schema = json!({
            "type": "object",
            "required": ["file_path"],
            "properties": { "file_path": { "type": "string" } },
            "additionalProperties": false
        });
        assert!(validate_arguments(&schema, &json!({"file_path": "a.rs"})).is_ok());
        assert_eq!(
            validate_arguments(&schema, &json!({"file_path": "a.rs", "extra": 1})),
            Err("unexpected argument 'extra'".to_string())
        );
        assert_eq!(
            validate_arguments(&schema, &json!(["a.rs"])),
            Err("action arguments must be a JSON object".to_string())
        );
    }
}
