//! Error types for the prompt chain

use thiserror::Error;

/// Result type alias for chain operations
pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Error, Debug)]
pub enum ChainError {

    // =============================
    // Pipeline Errors
    // =============================

    /// Backend unreachable, erroring, or past the caller's timeout.
    #[error("Model unavailable: {0}")]
    ModelUnavailableError(String),

    #[error("Schema validation failed for '{schema}': {reason}")]
    SchemaValidationError { schema: String, reason: String },

    /// Raised by a tool body. The dispatch loop records it as a tool-role
    /// message; it never reaches the caller of `PromptChain::run`.
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecutionError { tool: String, message: String },

    #[error("Tool loop exceeded {0} iterations without a final answer")]
    ToolLoopExceededError(u32),

    // =============================
    // Setup Errors
    // =============================

    #[error("Tool already registered: {0}")]
    DuplicateToolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ChainError {
    pub(crate) fn validation(schema: &str, reason: impl Into<String>) -> Self {
        ChainError::SchemaValidationError {
            schema: schema.to_string(),
            reason: reason.into(),
        }
    }

    pub fn tool(tool: &str, message: impl Into<String>) -> Self {
        ChainError::ToolExecutionError {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}
