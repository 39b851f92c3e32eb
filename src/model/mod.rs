//! Model invocation boundary
//!
//! The generative backend is an abstract capability. Transport lives
//! outside this crate; implementations only need to turn a request into a
//! [`ModelResponse`] or fail with `ModelUnavailableError`. No retries
//! happen at this layer.

use crate::error::ChainError;
use crate::models::{Message, ModelResponse, ToolDeclaration};
use crate::schema::StructuredSchema;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod scripted;
pub use scripted::ScriptedModel;

/// Borrowed view of one model call
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub model: &'a str,
    /// Never empty
    pub messages: &'a [Message],
    /// Structured output constraint, if any
    pub schema: Option<&'a StructuredSchema>,
    /// Tools the model may request; empty means none
    pub tools: &'a [ToolDeclaration],
}

impl<'a> ModelRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages,
            schema: None,
            tools: &[],
        }
    }

    pub fn with_schema(mut self, schema: &'a StructuredSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_tools(mut self, tools: &'a [ToolDeclaration]) -> Self {
        self.tools = tools;
        self
    }

    /// Content of the most recent user message
    pub fn last_user_content(&self) -> Option<&'a str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::models::Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Trait for generative model backends
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<ModelResponse>;
}

/// Any deterministic function of the request is an invoker
#[async_trait]
impl<F> ModelInvoker for F
where
    F: Fn(&ModelRequest<'_>) -> Result<ModelResponse> + Send + Sync,
{
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<ModelResponse> {
        self(&request)
    }
}

/// Pins a closure's signature so it can be used as an invoker
pub fn model_fn<F>(f: F) -> F
where
    F: Fn(&ModelRequest<'_>) -> Result<ModelResponse> + Send + Sync,
{
    f
}

/// Invoke with an optional caller-supplied time bound.
///
/// An empty message list never reaches the backend. An elapsed bound is
/// reported as `ModelUnavailableError`; retrying is up to the caller.
pub async fn invoke_bounded(
    invoker: &dyn ModelInvoker,
    request: ModelRequest<'_>,
    timeout: Option<Duration>,
) -> Result<ModelResponse> {
    if request.messages.is_empty() {
        return Err(ChainError::ModelUnavailableError(
            "request carried no messages".to_string(),
        ));
    }

    match timeout {
        Some(limit) => tokio::time::timeout(limit, invoker.invoke(request))
            .await
            .map_err(|_| {
                ChainError::ModelUnavailableError(format!(
                    "model call timed out after {:?}",
                    limit
                ))
            })?,
        None => invoker.invoke(request).await,
    }
}
