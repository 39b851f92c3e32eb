//! Schema validation
//!
//! The only place where untrusted model output becomes a trusted value.
//! Nothing is coerced: a number sent as a string is a failure.

use crate::error::ChainError;
use crate::schema::{FieldType, StructuredOutput, StructuredSchema};
use crate::Result;
use serde_json::Value;
use tracing::debug;

pub struct SchemaValidator;

impl SchemaValidator {
    /// Parse raw model text and check it against `schema`
    pub fn validate(raw_text: &str, schema: &StructuredSchema) -> Result<Value> {
        let cleaned = strip_code_fence(raw_text);

        let value: Value = serde_json::from_str(cleaned).map_err(|e| {
            ChainError::validation(&schema.name, format!("output is not valid JSON: {}", e))
        })?;

        Self::validate_value(value, schema)
    }

    /// Check an already-parsed value against `schema`
    pub fn validate_value(value: Value, schema: &StructuredSchema) -> Result<Value> {
        let object = value.as_object().ok_or_else(|| {
            ChainError::validation(&schema.name, "expected a JSON object at top level")
        })?;

        for field in &schema.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(ChainError::validation(
                            &schema.name,
                            format!("missing required field '{}'", field.name),
                        ));
                    }
                }
                Some(v) => check_type(&schema.name, &field.name, &field.field_type, v)?,
            }
        }

        for key in object.keys() {
            if schema.field(key).is_none() {
                debug!(schema = %schema.name, field = %key, "Ignoring undeclared field");
            }
        }

        Ok(value)
    }

    /// Validate then deserialize into the stage's typed output
    pub fn validate_as<T: StructuredOutput>(raw_text: &str) -> Result<T> {
        let schema = T::schema();
        let value = Self::validate(raw_text, &schema)?;

        serde_json::from_value(value)
            .map_err(|e| ChainError::validation(&schema.name, e.to_string()))
    }
}

fn check_type(schema: &str, field: &str, expected: &FieldType, value: &Value) -> Result<()> {
    let mismatch = |what: &str| {
        ChainError::validation(
            schema,
            format!("field '{}' must be {}, got {}", field, what, value),
        )
    };

    match expected {
        FieldType::String => {
            value.as_str().ok_or_else(|| mismatch("a string"))?;
        }
        FieldType::Boolean => {
            value.as_bool().ok_or_else(|| mismatch("a boolean"))?;
        }
        FieldType::Integer => {
            if !(value.is_i64() || value.is_u64()) {
                return Err(mismatch("an integer"));
            }
        }
        FieldType::Number { min, max } => {
            let n = value.as_f64().ok_or_else(|| mismatch("a number"))?;

            if min.map_or(false, |min| n < min) || max.map_or(false, |max| n > max) {
                return Err(ChainError::validation(
                    schema,
                    format!(
                        "field '{}' = {} outside [{}, {}]",
                        field,
                        n,
                        min.map_or("-inf".to_string(), |v| v.to_string()),
                        max.map_or("inf".to_string(), |v| v.to_string()),
                    ),
                ));
            }
        }
        FieldType::StringList => {
            let items = value.as_array().ok_or_else(|| mismatch("a list of strings"))?;
            if !items.iter().all(Value::is_string) {
                return Err(mismatch("a list of strings"));
            }
        }
    }

    Ok(())
}

/// Models often wrap JSON in a fence such as ```json or ```JSON; drop the
/// fence and its language tag before parsing
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body =
        body.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionResult;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn event_schema() -> StructuredSchema {
        StructuredSchema::new("EventDetails")
            .required("name", FieldType::String, "")
            .required("duration_minutes", FieldType::Integer, "")
            .required("participants", FieldType::StringList, "")
            .optional("calendar_link", FieldType::String, "")
    }

    fn assert_validation_error(result: Result<Value>, needle: &str) {
        match result {
            Err(ChainError::SchemaValidationError { reason, .. }) => {
                assert!(reason.contains(needle), "unexpected reason: {}", reason)
            }
            other => panic!("expected SchemaValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_output_passes() {
        let raw = r#"{"name": "Roadmap", "duration_minutes": 60, "participants": ["Alice", "Bob"]}"#;
        let value = assert_ok!(SchemaValidator::validate(raw, &event_schema()));
        assert_eq!(value["participants"], json!(["Alice", "Bob"]));
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let raw = "```json\n{\"name\": \"x\", \"duration_minutes\": 5, \"participants\": []}\n```";
        assert_ok!(SchemaValidator::validate(raw, &event_schema()));
    }

    #[test]
    fn test_fence_language_tag_any_case() {
        let body = "{\"name\": \"x\", \"duration_minutes\": 5, \"participants\": []}";
        for raw in [
            format!("```JSON\n{}\n```", body),
            format!("```Json\n{}\n```", body),
            format!("```\n{}\n```", body),
            format!("```json {}```", body),
        ] {
            assert_ok!(SchemaValidator::validate(&raw, &event_schema()));
        }
    }

    #[test]
    fn test_unparseable_text_fails() {
        assert_validation_error(
            SchemaValidator::validate("Sure! Here is your event.", &event_schema()),
            "not valid JSON",
        );
    }

    #[test]
    fn test_non_object_fails() {
        assert_validation_error(
            SchemaValidator::validate("[1, 2, 3]", &event_schema()),
            "JSON object",
        );
    }

    #[test]
    fn test_missing_required_field_fails() {
        let raw = r#"{"name": "Roadmap", "participants": []}"#;
        assert_validation_error(
            SchemaValidator::validate(raw, &event_schema()),
            "duration_minutes",
        );
    }

    #[test]
    fn test_null_required_field_fails() {
        let raw = r#"{"name": null, "duration_minutes": 60, "participants": []}"#;
        assert_validation_error(SchemaValidator::validate(raw, &event_schema()), "name");
    }

    #[test]
    fn test_no_coercion_of_stringly_numbers() {
        let raw = r#"{"name": "x", "duration_minutes": "60", "participants": []}"#;
        assert_validation_error(
            SchemaValidator::validate(raw, &event_schema()),
            "an integer",
        );

        let raw = r#"{"name": "x", "duration_minutes": 60.5, "participants": []}"#;
        assert_validation_error(
            SchemaValidator::validate(raw, &event_schema()),
            "an integer",
        );
    }

    #[test]
    fn test_mixed_list_fails() {
        let raw = r#"{"name": "x", "duration_minutes": 1, "participants": ["Alice", 2]}"#;
        assert_validation_error(
            SchemaValidator::validate(raw, &event_schema()),
            "list of strings",
        );
    }

    #[test]
    fn test_optional_field_absent_or_null_passes_but_must_typecheck() {
        let raw = r#"{"name": "x", "duration_minutes": 1, "participants": [], "calendar_link": null}"#;
        assert_ok!(SchemaValidator::validate(raw, &event_schema()));

        let raw = r#"{"name": "x", "duration_minutes": 1, "participants": [], "calendar_link": 42}"#;
        assert_err!(SchemaValidator::validate(raw, &event_schema()));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let raw = r#"{"name": "x", "duration_minutes": 1, "participants": [], "mood": "great"}"#;
        assert_ok!(SchemaValidator::validate(raw, &event_schema()));
    }

    #[test]
    fn test_typed_extraction_with_range() {
        let raw = r#"{"description": "meeting", "is_valid_case": true, "confidence_score": 0.95}"#;
        let extraction: ExtractionResult = assert_ok!(SchemaValidator::validate_as(raw));
        assert!(extraction.is_valid_case);
        assert_eq!(extraction.confidence_score, 0.95);

        let raw = r#"{"description": "meeting", "is_valid_case": true, "confidence_score": 1.4}"#;
        assert_err!(SchemaValidator::validate_as::<ExtractionResult>(raw));
    }
}
