//! Capability input/output types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request from the decision provider to invoke a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Name of the capability to invoke
    pub capability_name: String,

    /// Input handed to the capability after schema validation
    #[serde(default)]
    pub input: Value,
}

impl Action {
    /// Create a new action
    pub fn new(capability_name: impl Into<String>, input: Value) -> Self {
        Self {
            capability_name: capability_name.into(),
            input,
        }
    }
}

/// One decision: a thought and, optionally, an action to perform next.
///
/// A decision without an action ends the run; its thought becomes the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub thought: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl Decision {
    /// A terminal decision carrying the final answer
    pub fn finish(thought: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: None,
        }
    }

    /// A decision that invokes a capability
    pub fn act(thought: impl Into<String>, capability_name: impl Into<String>, input: Value) -> Self {
        Self {
            thought: thought.into(),
            action: Some(Action::new(capability_name, input)),
        }
    }

    /// Whether this decision ends the run
    pub fn is_final(&self) -> bool {
        self.action.is_none()
    }
}

/// Usage example attached to a capability.
///
/// Examples are rendered into capability descriptions only; they are never executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityExample {
    /// Example input
    pub input: Value,

    /// Expected output, if worth showing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Short note on what the example demonstrates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CapabilityExample {
    /// Create an example from an input value
    pub fn new(input: Value) -> Self {
        Self {
            input,
            output: None,
            description: None,
        }
    }

    /// Attach the expected output
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Structural validation failure for a capability input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct ValidationError {
    /// Location of the offending value, e.g. `$.items[2].name`
    pub path: String,

    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// What went wrong at a given path
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationErrorKind {
    #[error("missing required field")]
    MissingField,

    #[error("unexpected field")]
    UnexpectedField,

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} is outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("length {len} is outside [{min}, {max}]")]
    Length { len: usize, min: usize, max: usize },

    #[error("value '{0}' is not one of the allowed values")]
    NotAllowed(String),
}

/// Name of a JSON value's type, as used in validation messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
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
    fn test_decision_finish() {
        let decision = Decision::finish("done");
        assert!(decision.is_final());
        assert_eq!(decision.thought, "done");
    }

    #[test]
    fn test_decision_act() {
        let decision = Decision::act("look it up", "search", json!({"q": "rust"}));
        assert!(!decision.is_final());
        let action = decision.action.unwrap();
        assert_eq!(action.capability_name, "search");
        assert_eq!(action.input, json!({"q": "rust"}));
    }

    #[test]
    fn test_decision_deserialize_without_action() {
        let decision: Decision = serde_json::from_str(r#"{"thought":"x"}"#).unwrap();
        assert!(decision.is_final());
    }

    #[test]
    fn test_decision_serialization_skips_missing_action() {
        let json = serde_json::to_string(&Decision::finish("x")).unwrap();
        assert!(!json.contains("action"));
    }

    #[test]
    fn test_example_builder() {
        let example = CapabilityExample::new(json!({"text": "hi"}))
            .with_output(json!("hi"))
            .with_description("echoes text");
        assert_eq!(example.output, Some(json!("hi")));
        assert_eq!(example.description.as_deref(), Some("echoes text"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new(
            "$.count",
            ValidationErrorKind::TypeMismatch {
                expected: "integer",
                found: "string",
            },
        );
        assert_eq!(err.to_string(), "$.count: expected integer, found string");
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(1)), "integer");
        assert_eq!(json_type_name(&json!(1.5)), "number");
        assert_eq!(json_type_name(&json!("s")), "string");
        assert_eq!(json_type_name(&json!([])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }
}
