//! Tool trait and registry
//!
//! Tools are registered once during setup. After that the registry is
//! shared read-only (behind an `Arc`) by every chain invocation.

use crate::error::ChainError;
use crate::models::ToolDeclaration;
use crate::schema::StructuredSchema;
use crate::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Trait for a single callable tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Declared parameters; arguments are validated against this before execution
    fn parameters(&self) -> StructuredSchema;

    /// Failures must come back as `ToolExecutionError`, never a panic
    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value>;

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().to_json_schema(),
        }
    }
}

type ToolFn = dyn Fn(Map<String, Value>) -> Result<Value> + Send + Sync;

/// Tool backed by a plain synchronous closure
pub struct FnTool {
    name: String,
    description: String,
    parameters: StructuredSchema,
    callable: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: StructuredSchema,
        callable: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            callable: Box::new(callable),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> StructuredSchema {
        self.parameters.clone()
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value> {
        (self.callable)(arguments)
    }
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Names are unique; a second registration under the same name fails
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ChainError::DuplicateToolError(name));
        }

        debug!(tool_name = %name, "Registering tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: StructuredSchema,
        callable: F,
    ) -> Result<()>
    where
        F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnTool::new(name, description, parameters, callable)))
    }

    /// Exact, case-sensitive lookup
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations for the model, sorted by name
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<_> = self.tools.values().map(|t| t.declaration()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(
                "echo",
                "Echo the text back",
                StructuredSchema::new("echo_args").required("text", FieldType::String, ""),
                |args| Ok(json!({ "echo": args.get("text").cloned().unwrap_or(Value::Null) })),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = echo_registry();
        let result = registry.register_fn(
            "echo",
            "another echo",
            StructuredSchema::new("echo_args"),
            |_| Ok(Value::Null),
        );
        assert!(matches!(result, Err(ChainError::DuplicateToolError(name)) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolution_is_exact_and_case_sensitive() {
        let registry = echo_registry();
        assert!(registry.resolve("echo").is_some());
        assert!(registry.resolve("Echo").is_none());
        assert!(registry.resolve("echo ").is_none());
        assert!(registry.resolve("ech").is_none());
    }

    #[test]
    fn test_declarations_sorted() {
        let mut registry = echo_registry();
        registry
            .register_fn("add", "Add", StructuredSchema::new("add_args"), |_| Ok(json!(0)))
            .unwrap();

        let declarations = registry.declarations();
        let names: Vec<_> = declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["add", "echo"]);
        assert_eq!(declarations[1].parameters["required"], json!(["text"]));
        assert_eq!(registry.list(), vec!["add", "echo"]);
    }

    #[tokio::test]
    async fn test_fn_tool_executes() {
        let registry = echo_registry();
        let tool = registry.resolve("echo").unwrap();

        let mut args = Map::new();
        args.insert("text".to_string(), json!("hi"));
        let output = tool.execute(args).await.unwrap();
        assert_eq!(output, json!({ "echo": "hi" }));
    }
}
