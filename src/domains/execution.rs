//! Program execution: parse a repeat count, drive the integer array tool,
//! then summarize the resulting array state.

use crate::chain::ChainDomain;
use crate::dispatch::DispatchOutcome;
use crate::error::ChainError;
use crate::models::{Message, ToolOutcome};
use crate::schema::{FieldType, StructuredOutput, StructuredSchema};
use crate::tools::{Tool, ToolRegistry};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const ADD_TO_ARRAY: &str = "add_to_array";

/// Upper bound on a single `add_to_array` call
pub const MAX_ADDS_PER_CALL: i64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionDetails {
    pub num_times_to_execute: i64,
}

impl StructuredOutput for ExecutionDetails {
    fn schema() -> StructuredSchema {
        StructuredSchema::new("ExecutionDetails").required(
            "num_times_to_execute",
            FieldType::Integer,
            "Number of times to add to the array",
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub array_state: String,
    pub command_summary: String,
}

impl StructuredOutput for ExecutionSummary {
    fn schema() -> StructuredSchema {
        StructuredSchema::new("ExecutionSummary")
            .required(
                "array_state",
                FieldType::String,
                "String representation of the integer array",
            )
            .required(
                "command_summary",
                FieldType::String,
                "Summary of the command details",
            )
    }
}

//
// ================= Integer Array =================
//

/// Scoped integer array handle.
///
/// Acquired inside the tool call that uses it and released when dropped;
/// never leaves the dispatch loop.
#[derive(Debug)]
pub struct IntegerArray {
    values: Vec<i64>,
}

impl IntegerArray {
    pub fn acquire() -> Self {
        debug!("IntegerArray acquired");
        Self { values: Vec::new() }
    }

    pub fn add(&mut self, value: i64) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rendered as `[0, 1, 2]`
    pub fn state(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IntegerArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

impl Drop for IntegerArray {
    fn drop(&mut self) {
        debug!(len = self.values.len(), "IntegerArray released");
    }
}

//
// ================= Tool =================
//

/// Adds `0..num_times` to a fresh array and reports its state
pub struct AddToArrayTool;

#[async_trait::async_trait]
impl Tool for AddToArrayTool {
    fn name(&self) -> &str {
        ADD_TO_ARRAY
    }

    fn description(&self) -> &str {
        "Add the integers 0..num_times to an integer array and return the array state"
    }

    fn parameters(&self) -> StructuredSchema {
        StructuredSchema::new("add_to_array_args").required(
            "num_times",
            FieldType::Integer,
            "Number of times to add to the array",
        )
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value> {
        let num_times = arguments
            .get("num_times")
            .and_then(Value::as_i64)
            .ok_or_else(|| ChainError::tool(ADD_TO_ARRAY, "num_times must be an integer"))?;

        if !(0..=MAX_ADDS_PER_CALL).contains(&num_times) {
            return Err(ChainError::tool(
                ADD_TO_ARRAY,
                format!(
                    "num_times must be between 0 and {}, got {}",
                    MAX_ADDS_PER_CALL, num_times
                ),
            ));
        }

        let mut array = IntegerArray::acquire();
        for i in 0..num_times {
            array.add(i);
        }

        Ok(json!({
            "added": num_times,
            "array_state": array.state(),
        }))
    }
}

/// Registry holding the execution tools
pub fn execution_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AddToArrayTool))?;
    Ok(registry)
}

//
// ================= Domain =================
//

pub struct ExecutionDomain;

impl ExecutionDomain {
    /// Array state reported by the last successful tool call, `[]` if none ran
    fn array_state(dispatch: Option<&DispatchOutcome>) -> String {
        dispatch
            .and_then(|d| {
                d.results
                    .iter()
                    .rev()
                    .filter(|r| r.tool_name == ADD_TO_ARRAY && r.outcome == ToolOutcome::Success)
                    .find_map(|r| r.output.get("array_state").and_then(Value::as_str))
            })
            .unwrap_or("[]")
            .to_string()
    }
}

impl ChainDomain for ExecutionDomain {
    type Detail = ExecutionDetails;
    type Final = ExecutionSummary;

    fn name(&self) -> &str {
        "execution"
    }

    fn extraction_prompt(&self) -> String {
        "Analyze if the text describes a program execution command that specifies a number \
         of times to add to an array, and provide a confidence score on how sure you are of \
         your judgement. Reject commands that ask for anything else, such as shutting down, \
         and give them a low confidence score. Store the user input as the description if it \
         is a program execution command."
            .to_string()
    }

    fn detail_prompt(&self) -> String {
        "Extract detailed execution command information from user input.".to_string()
    }

    fn dispatch_seed(&self, detail: &ExecutionDetails) -> Option<Vec<Message>> {
        Some(vec![
            Message::system(format!(
                "Execute the command by calling {} exactly once with num_times set to the \
                 number of times to execute. Reply without tool calls once it has run.",
                ADD_TO_ARRAY
            )),
            Message::user(format!(
                "Number of times to execute: {}",
                detail.num_times_to_execute
            )),
        ])
    }

    fn confirmation_messages(
        &self,
        detail: &ExecutionDetails,
        dispatch: Option<&DispatchOutcome>,
    ) -> Vec<Message> {
        vec![
            Message::system(
                "Store the contents of the integer array and generate a summary of the command \
                 executed. The summary should be solely based on command details.",
            ),
            Message::user(format!(
                "Command details: {}, array contents: {}",
                serde_json::to_string(detail).unwrap_or_default(),
                Self::array_state(dispatch)
            )),
        ]
    }
}
