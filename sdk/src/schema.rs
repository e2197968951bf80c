//! Structural input schemas for capabilities
//!
//! A capability declares the shape of the JSON input it accepts as an
//! [`InputSchema`]. The registry validates every input against it before the
//! capability runs, so `execute` implementations can rely on the shape.
//!
//! ```
//! use sdk::schema::InputSchema;
//! use serde_json::json;
//!
//! let schema = InputSchema::object()
//!     .field("path", InputSchema::string())
//!     .optional_field("limit", InputSchema::integer().min(1.0));
//!
//! assert!(schema.validate(&json!({"path": "notes.txt"})).is_ok());
//! assert!(schema.validate(&json!({"limit": 5})).is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::{json_type_name, ValidationError, ValidationErrorKind};

/// Declared shape of a JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputSchema {
    /// Accepts anything
    Any,
    Null,
    Boolean,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        /// Closed set of accepted values
        #[serde(default, skip_serializing_if = "Option::is_none")]
        allowed: Option<Vec<String>>,
    },
    Array {
        items: Box<InputSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    Object {
        /// Declared fields in declaration order
        properties: Vec<(String, InputSchema)>,
        required: Vec<String>,
        /// Whether undeclared fields are tolerated
        additional_properties: bool,
    },
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::Any
    }
}

impl InputSchema {
    pub fn any() -> Self {
        Self::Any
    }

    pub fn null() -> Self {
        Self::Null
    }

    pub fn boolean() -> Self {
        Self::Boolean
    }

    pub fn number() -> Self {
        Self::Number {
            minimum: None,
            maximum: None,
        }
    }

    pub fn integer() -> Self {
        Self::Integer {
            minimum: None,
            maximum: None,
        }
    }

    pub fn string() -> Self {
        Self::String {
            min_length: None,
            max_length: None,
            allowed: None,
        }
    }

    /// A string restricted to a closed set of values
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::String {
            min_length: None,
            max_length: None,
            allowed: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn array(items: InputSchema) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// An empty object schema that tolerates undeclared fields
    pub fn object() -> Self {
        Self::Object {
            properties: Vec::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }

    /// Add a required field to an object schema
    ///
    /// Has no effect on non-object schemas.
    pub fn field(self, name: impl Into<String>, schema: InputSchema) -> Self {
        self.push_field(name.into(), schema, true)
    }

    /// Add an optional field to an object schema
    pub fn optional_field(self, name: impl Into<String>, schema: InputSchema) -> Self {
        self.push_field(name.into(), schema, false)
    }

    /// Reject undeclared fields on an object schema
    pub fn strict(mut self) -> Self {
        if let Self::Object {
            additional_properties,
            ..
        } = &mut self
        {
            *additional_properties = false;
        }
        self
    }

    /// Lower bound for numbers and integers
    pub fn min(mut self, bound: f64) -> Self {
        match &mut self {
            Self::Number { minimum, .. } | Self::Integer { minimum, .. } => *minimum = Some(bound),
            _ => {}
        }
        self
    }

    /// Upper bound for numbers and integers
    pub fn max(mut self, bound: f64) -> Self {
        match &mut self {
            Self::Number { maximum, .. } | Self::Integer { maximum, .. } => *maximum = Some(bound),
            _ => {}
        }
        self
    }

    /// Length bounds for strings, item-count bounds for arrays
    pub fn length(mut self, min: usize, max: usize) -> Self {
        match &mut self {
            Self::String {
                min_length,
                max_length,
                ..
            } => {
                *min_length = Some(min);
                *max_length = Some(max);
            }
            Self::Array {
                min_items,
                max_items,
                ..
            } => {
                *min_items = Some(min);
                *max_items = Some(max);
            }
            _ => {}
        }
        self
    }

    fn push_field(mut self, name: String, schema: InputSchema, is_required: bool) -> Self {
        if let Self::Object {
            properties,
            required,
            ..
        } = &mut self
        {
            properties.retain(|(existing, _)| existing != &name);
            required.retain(|existing| existing != &name);
            if is_required {
                required.push(name.clone());
            }
            properties.push((name, schema));
        }
        self
    }

    /// Validate a value against this schema, reporting the first failure
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.validate_at("$", value)
    }

    fn validate_at(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        match self {
            Self::Any => Ok(()),
            Self::Null => expect_type(path, value, "null", value.is_null()),
            Self::Boolean => expect_type(path, value, "boolean", value.is_boolean()),
            Self::Number { minimum, maximum } => {
                let n = value.as_f64().ok_or_else(|| mismatch(path, "number", value))?;
                check_range(path, n, *minimum, *maximum)
            }
            Self::Integer { minimum, maximum } => {
                if !(value.is_i64() || value.is_u64()) {
                    return Err(mismatch(path, "integer", value));
                }
                let n = value.as_f64().unwrap_or_default();
                check_range(path, n, *minimum, *maximum)
            }
            Self::String {
                min_length,
                max_length,
                allowed,
            } => {
                let s = value.as_str().ok_or_else(|| mismatch(path, "string", value))?;
                check_length(path, s.chars().count(), *min_length, *max_length)?;
                match allowed {
                    Some(values) if !values.iter().any(|v| v == s) => Err(ValidationError::new(
                        path,
                        ValidationErrorKind::NotAllowed(s.to_string()),
                    )),
                    _ => Ok(()),
                }
            }
            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let elements = value.as_array().ok_or_else(|| mismatch(path, "array", value))?;
                check_length(path, elements.len(), *min_items, *max_items)?;
                for (i, element) in elements.iter().enumerate() {
                    items.validate_at(&format!("{}[{}]", path, i), element)?;
                }
                Ok(())
            }
            Self::Object {
                properties,
                required,
                additional_properties,
            } => {
                let map = value.as_object().ok_or_else(|| mismatch(path, "object", value))?;
                for name in required {
                    if !map.contains_key(name) {
                        return Err(ValidationError::new(
                            format!("{}.{}", path, name),
                            ValidationErrorKind::MissingField,
                        ));
                    }
                }
                for (name, field_value) in map {
                    match properties.iter().find(|(declared, _)| declared == name) {
                        Some((_, schema)) => {
                            schema.validate_at(&format!("{}.{}", path, name), field_value)?
                        }
                        None if !additional_properties => {
                            return Err(ValidationError::new(
                                format!("{}.{}", path, name),
                                ValidationErrorKind::UnexpectedField,
                            ))
                        }
                        None => {}
                    }
                }
                Ok(())
            }
        }
    }

    /// Render as a JSON-Schema-shaped document for decision providers
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::Any => json!({}),
            Self::Null => json!({"type": "null"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Number { minimum, maximum } => with_bounds("number", *minimum, *maximum),
            Self::Integer { minimum, maximum } => with_bounds("integer", *minimum, *maximum),
            Self::String {
                min_length,
                max_length,
                allowed,
            } => {
                let mut doc = Map::new();
                doc.insert("type".into(), json!("string"));
                if let Some(min) = min_length {
                    doc.insert("minLength".into(), json!(min));
                }
                if let Some(max) = max_length {
                    doc.insert("maxLength".into(), json!(max));
                }
                if let Some(values) = allowed {
                    doc.insert("enum".into(), json!(values));
                }
                Value::Object(doc)
            }
            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut doc = Map::new();
                doc.insert("type".into(), json!("array"));
                doc.insert("items".into(), items.to_json_schema());
                if let Some(min) = min_items {
                    doc.insert("minItems".into(), json!(min));
                }
                if let Some(max) = max_items {
                    doc.insert("maxItems".into(), json!(max));
                }
                Value::Object(doc)
            }
            Self::Object {
                properties,
                required,
                additional_properties,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, schema)| (name.clone(), schema.to_json_schema()))
                    .collect();
                json!({
                    "type": "object",
                    "properties": props,
                    "required": required,
                    "additionalProperties": additional_properties,
                })
            }
        }
    }
}

fn mismatch(path: &str, expected: &'static str, value: &Value) -> ValidationError {
    ValidationError::new(
        path,
        ValidationErrorKind::TypeMismatch {
            expected,
            found: json_type_name(value),
        },
    )
}

fn expect_type(
    path: &str,
    value: &Value,
    expected: &'static str,
    ok: bool,
) -> Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        Err(mismatch(path, expected, value))
    }
}

fn check_range(
    path: &str,
    n: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
) -> Result<(), ValidationError> {
    let min = minimum.unwrap_or(f64::NEG_INFINITY);
    let max = maximum.unwrap_or(f64::INFINITY);
    if n < min || n > max {
        return Err(ValidationError::new(
            path,
            ValidationErrorKind::OutOfRange { value: n, min, max },
        ));
    }
    Ok(())
}

fn check_length(
    path: &str,
    len: usize,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), ValidationError> {
    let min = min.unwrap_or(0);
    let max = max.unwrap_or(usize::MAX);
    if len < min || len > max {
        return Err(ValidationError::new(
            path,
            ValidationErrorKind::Length { len, min, max },
        ));
    }
    Ok(())
}

fn with_bounds(kind: &str, minimum: Option<f64>, maximum: Option<f64>) -> Value {
    let mut doc = Map::new();
    doc.insert("type".into(), json!(kind));
    if let Some(min) = minimum {
        doc.insert("minimum".into(), json!(min));
    }
    if let Some(max) = maximum {
        doc.insert("maximum".into(), json!(max));
    }
    Value::Object(doc)
}
