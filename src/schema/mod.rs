//! Structured schemas
//!
//! A schema is a named, versioned set of typed fields. The same value is
//! rendered as a JSON-Schema descriptor for the model backend and used by
//! [`SchemaValidator`] to check what the model actually returned.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub mod validator;
pub use validator::SchemaValidator;

/// Type of a single schema field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldType {
    String,
    /// Any JSON number, optionally bounded (inclusive)
    Number { min: Option<f64>, max: Option<f64> },
    /// JSON integer only
    Integer,
    Boolean,
    StringList,
}

impl FieldType {
    pub fn number() -> Self {
        FieldType::Number { min: None, max: None }
    }

    pub fn number_in(min: f64, max: f64) -> Self {
        FieldType::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            FieldType::String => json!({ "type": "string" }),
            FieldType::Number { min, max } => {
                let mut out = json!({ "type": "number" });
                if let Some(min) = min {
                    out["minimum"] = json!(min);
                }
                if let Some(max) = max {
                    out["maximum"] = json!(max);
                }
                out
            }
            FieldType::Integer => json!({ "type": "integer" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::StringList => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

/// Named shape with a fixed set of typed fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSchema {
    pub name: String,
    pub version: u32,
    pub fields: Vec<FieldSpec>,
}

impl StructuredSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            fields: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn required(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required: true,
            description: description.into(),
        });
        self
    }

    pub fn optional(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required: false,
            description: description.into(),
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Render as the JSON-Schema descriptor sent to the model backend
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::with_capacity(self.fields.len());
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = field.field_type.json_schema();
            if !field.description.is_empty() {
                prop["description"] = json!(field.description);
            }
            properties.insert(field.name.clone(), prop);

            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A typed value that a stage asks the model to produce.
///
/// Implementors declare their schema once; [`SchemaValidator::validate_as`]
/// checks raw output against it before deserializing.
pub trait StructuredOutput: DeserializeOwned + Serialize + Send {
    fn schema() -> StructuredSchema;
}
