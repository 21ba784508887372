//! Model reply parsing.
//!
//! Replies are untrusted. Each one goes through three gates:
//!
//! 1. Markdown code fences are stripped and the text is parsed as JSON.
//! 2. The value is checked against a JSON Schema for its contract.
//! 3. The value is deserialized into the typed result.
//!
//! Only structure is checked here. Whether a role exists or a member is
//! sensible is left to the validation model, so a syntactically valid
//! but semantically wrong policy passes this module unchanged.

use iamgen_core::{GenerationResult, Policy, ValidationResult};
use jsonschema::Validator;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("input is empty")]
    Empty,

    #[error("not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("does not match the expected structure: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

fn policy_schema() -> Value {
    json!({
        "type": "object",
        "required": ["bindings"],
        "properties": {
            "bindings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["role", "members"],
                    "additionalProperties": false,
                    "properties": {
                        "role": {"type": "string", "minLength": 1},
                        "members": {
                            "type": "array",
                            "items": {"type": "string", "minLength": 1}
                        },
                        "condition": {
                            "type": "object",
                            "required": ["title", "expression"],
                            "additionalProperties": false,
                            "properties": {
                                "title": {"type": "string"},
                                "description": {"type": "string"},
                                "expression": {"type": "string", "minLength": 1},
                                "location": {"type": "string"}
                            }
                        }
                    }
                }
            }
        }
    })
}

static POLICY_SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    jsonschema::validator_for(&policy_schema()).expect("policy schema must compile")
});

static GENERATION_SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    let schema = json!({
        "type": "object",
        "properties": {
            "policy": {"anyOf": [{"type": "null"}, policy_schema()]},
            "chat_response": {"type": ["string", "null"]},
            "validate": {"type": ["boolean", "null"]}
        }
    });
    jsonschema::validator_for(&schema).expect("generation schema must compile")
});

static VALIDATION_SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    let schema = json!({
        "type": "object",
        "required": ["valid"],
        "properties": {
            "valid": {"type": "boolean"},
            "chat_response": {"type": ["string", "null"]},
            "suggested_fixes": {"type": ["object", "null"]}
        }
    });
    jsonschema::validator_for(&schema).expect("validation schema must compile")
});

/// Extract the body of a Markdown code fence (```` ``` ```` or ```` ```json ````).
///
/// Prose before the opening fence or after the closing one is dropped. A reply
/// without a fence is returned trimmed.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[open + 3..];
    // Drop the info string ("json", "JSON", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Parse a reply as JSON after removing code fences.
pub fn parse_json(raw: &str) -> Result<Value, ParseError> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    serde_json::from_str(text).map_err(ParseError::InvalidJson)
}

/// Parse a generation or regeneration reply.
///
/// A bare policy object (top-level `bindings`, no `policy` key) is accepted
/// and treated as `{"policy": <object>}`.
pub fn parse_generation(raw: &str) -> Result<GenerationResult, ParseError> {
    let mut object = into_object(parse_json(raw)?)?;
    if !object.contains_key("policy") && object.contains_key("bindings") {
        let validate = object.remove("validate");
        let chat_response = object.remove("chat_response");
        let mut wrapped = Map::new();
        wrapped.insert("policy".into(), Value::Object(object));
        if let Some(v) = validate {
            wrapped.insert("validate".into(), v);
        }
        if let Some(c) = chat_response {
            wrapped.insert("chat_response".into(), c);
        }
        object = wrapped;
    }

    let value = Value::Object(object);
    check(&GENERATION_SCHEMA, &value)?;

    let mut object = into_object(value)?;
    // `"validate": null` is treated as absent.
    if object.get("validate").is_some_and(Value::is_null) {
        object.remove("validate");
    }
    serde_json::from_value(Value::Object(object)).map_err(ParseError::Shape)
}

/// Parse a validation reply.
///
/// `feedback` is accepted in any JSON form and flattened to text. A malformed
/// `suggested_fixes` is dropped rather than failing the whole verdict.
pub fn parse_validation(raw: &str) -> Result<ValidationResult, ParseError> {
    let value = parse_json(raw)?;
    check(&VALIDATION_SCHEMA, &value)?;
    let mut object = into_object(value)?;

    let feedback = object.remove("feedback").and_then(stringify_feedback);
    let suggested_fixes = object.remove("suggested_fixes").and_then(|v| {
        if v.is_null() {
            return None;
        }
        match parse_policy(&v) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed suggested_fixes from validator");
                None
            }
        }
    });

    let mut result: ValidationResult =
        serde_json::from_value(Value::Object(object)).map_err(ParseError::Shape)?;
    result.feedback = feedback;
    result.suggested_fixes = suggested_fixes;
    Ok(result)
}

/// Parse a policy supplied either as JSON text or as an already-decoded object.
pub fn parse_policy(value: &Value) -> Result<Policy, ParseError> {
    let owned;
    let value = match value {
        Value::String(text) => {
            owned = parse_json(text)?;
            &owned
        }
        other => other,
    };
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    check(&POLICY_SCHEMA, value)?;
    serde_json::from_value(value.clone()).map_err(ParseError::Shape)
}

fn into_object(value: Value) -> Result<Map<String, Value>, ParseError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

fn check(validator: &Validator, value: &Value) -> Result<(), ParseError> {
    let errors: Vec<String> = validator
        .iter_errors(value)
        .take(10)
        .map(|e| {
            let path = e.instance_path().to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ParseError::Schema(errors))
    }
}

fn stringify_feedback(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}
