//! Core data models for the prompt chain

use crate::schema::{FieldType, StructuredOutput, StructuredSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_name: None,
        }
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_name: Some(tool_name.into()),
        }
    }
}

//
// ================= Model I/O =================
//

/// Tool declaration handed to the model backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON-Schema of the tool's parameters
    pub parameters: Value,
}

/// Model-issued request to run a tool. Untrusted until resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelResponse {
    /// May be empty when tool calls are present
    pub content: String,
    #[serde(default)]
    pub tool_call_requests: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_call_requests: Vec::new(),
        }
    }

    pub fn structured(value: Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_call_requests: calls,
        }
    }
}

//
// ================= Tool Results =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    UnknownTool,
    ExecutionError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub outcome: ToolOutcome,
    pub output: Value,
}

impl ToolCallResult {
    /// Tool-role message carrying the serialized output
    pub fn to_message(&self) -> Message {
        Message::tool(self.tool_name.clone(), self.output.to_string())
    }
}

//
// ================= Stage 1 =================
//

/// First-stage extraction consumed by the gate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub description: String,
    pub is_valid_case: bool,
    pub confidence_score: f64,
}

impl StructuredOutput for ExtractionResult {
    fn schema() -> StructuredSchema {
        StructuredSchema::new("ExtractionResult")
            .required(
                "description",
                FieldType::String,
                "Raw description of the request",
            )
            .required(
                "is_valid_case",
                FieldType::Boolean,
                "Whether the input is a request this pipeline handles",
            )
            .required(
                "confidence_score",
                FieldType::number_in(0.0, 1.0),
                "Confidence score between 0 and 1",
            )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serialization() {
        let msg = Message::tool("search_kb", "{\"answer\":1}");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_name"], "search_kb");

        let user = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(user.get("tool_call_name").is_none());
    }

    #[test]
    fn test_tool_call_request_drops_non_object_arguments() {
        let call = ToolCallRequest::new("add_to_array", json!([7]));
        assert!(call.arguments.is_empty());

        let call = ToolCallRequest::new("add_to_array", json!({ "count": 7 }));
        assert_eq!(call.arguments["count"], json!(7));
    }
}
