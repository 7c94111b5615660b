//! Output-schema validation for phase payloads.
//!
//! An output that fails validation is treated as a retriable error per the
//! Step Executor contract (4.C) — whitespace-only text, empty required
//! arrays, and shape violations are exactly the failures this guards
//! against.

use serde_json::{json, Value};

/// Structural JSON Schema for one phase's output payload.
pub fn schema_for(phase_name: &str) -> Value {
    match phase_name {
        "concept" => json!({
            "type": "object",
            "required": ["title", "logline", "themes"],
            "properties": {
                "title": {"type": "string", "minLength": 1},
                "logline": {"type": "string", "minLength": 1},
                "themes": {"type": "array", "items": {"type": "string"}, "minItems": 1}
            }
        }),
        "constitution" => json!({
            "type": "object",
            "required": ["voice", "rules"],
            "properties": {
                "voice": {"type": "string", "minLength": 1},
                "rules": {"type": "array", "items": {"type": "string"}, "minItems": 1}
            }
        }),
        "plan" => json!({
            "type": "object",
            "required": ["chapters"],
            "properties": {
                "chapters": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["title", "scenes"],
                        "properties": {
                            "title": {"type": "string", "minLength": 1},
                            "scenes": {
                                "type": "array",
                                "minItems": 1,
                                "items": {
                                    "type": "object",
                                    "required": ["summary"],
                                    "properties": {"summary": {"type": "string", "minLength": 1}}
                                }
                            }
                        }
                    }
                }
            }
        }),
        "write" | "polish" => json!({
            "type": "object",
            "required": ["title", "text"],
            "properties": {
                "title": {"type": "string", "minLength": 1},
                "text": {"type": "string", "minLength": 1}
            }
        }),
        "cover" => json!({
            "type": "object",
            "required": ["image_reference", "composed"],
            "properties": {
                "image_reference": {"type": "string", "minLength": 1},
                "composed": {"type": "boolean"}
            }
        }),
        "finalize" => json!({
            "type": "object",
            "required": ["manuscript_ref"],
            "properties": {"manuscript_ref": {"type": "string", "minLength": 1}}
        }),
        other => json!({"type": "object"}).tap_unknown(other),
    }
}

trait TapUnknown {
    fn tap_unknown(self, phase_name: &str) -> Self;
}

impl TapUnknown for Value {
    fn tap_unknown(self, phase_name: &str) -> Self {
        tracing::warn!(phase = phase_name, "no declared output schema; accepting any object");
        self
    }
}

/// `minLength: 1` in JSON Schema counts raw UTF-16 code units, so a
/// whitespace-only string (`" "`, `"\n\t"`) satisfies it. Walk the payload
/// looking for exactly that case so it's caught as a validation failure
/// rather than silently accepted.
fn contains_blank_string(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty() && s.trim().is_empty(),
        Value::Array(items) => items.iter().any(contains_blank_string),
        Value::Object(fields) => fields.values().any(contains_blank_string),
        _ => false,
    }
}

/// Validate a payload against its phase's declared schema. Validation
/// failure is always retriable (see `executor::retry::ExecError::Transient`).
pub fn validate(phase_name: &str, payload: &Value) -> Result<(), String> {
    let schema = schema_for(phase_name);
    let compiled = jsonschema::JSONSchema::compile(&schema)
        .map_err(|e| format!("invalid schema for phase {phase_name}: {e}"))?;

    let result = compiled.validate(payload);
    if let Err(errors) = result {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(messages.join("; "));
    }

    if contains_blank_string(payload) {
        return Err("whitespace-only string field".to_string());
    }

    Ok(())
}
