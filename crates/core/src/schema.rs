//! Declarative tool input schemas.
//!
//! Each tool describes its arguments as a list of fields. The same value is
//! rendered to JSON Schema for the model and used by [`ToolSchema::validate`]
//! to check arguments before a tool ever sees them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// The JSON type a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Boolean,
    Integer,
}

impl FieldType {
    fn json_name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

/// One named argument of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

/// Why a set of arguments was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be a {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// The input schema of a tool: an object with typed fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    fields: Vec<FieldSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    pub fn required(self, name: &str, field_type: FieldType, description: &str) -> Self {
        self.field(name, field_type, true, description)
    }

    /// Add an optional field. `null` is accepted as "absent".
    pub fn optional(self, name: &str, field_type: FieldType, description: &str) -> Self {
        self.field(name, field_type, false, description)
    }

    fn field(mut self, name: &str, field_type: FieldType, required: bool, description: &str) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            field_type,
            required,
            description: description.to_string(),
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Render as a JSON Schema object.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for f in &self.fields {
            properties.insert(
                f.name.clone(),
                json!({
                    "type": f.field_type.json_name(),
                    "description": f.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check `arguments` against this schema.
    ///
    /// Unknown fields are ignored.
    pub fn validate(&self, arguments: &Value) -> Result<(), SchemaViolation> {
        let object = arguments
            .as_object()
            .ok_or_else(|| SchemaViolation::NotAnObject(json_kind(arguments)))?;

        for f in &self.fields {
            match object.get(&f.name) {
                None | Some(Value::Null) if f.required => {
                    return Err(SchemaViolation::MissingField(f.name.clone()));
                }
                None | Some(Value::Null) => {}
                Some(value) if !f.field_type.accepts(value) => {
                    return Err(SchemaViolation::WrongType {
                        field: f.name.clone(),
                        expected: f.field_type.json_name(),
                        actual: json_kind(value),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
