//! Scripted model for development & testing
//!
//! Replays a fixed queue of responses and keeps every request it saw, so
//! chains can run end to end without a backend.

use crate::error::ChainError;
use crate::model::{ModelInvoker, ModelRequest};
use crate::models::{Message, ModelResponse};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Owned copy of a request, kept for assertions
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub schema_name: Option<String>,
    pub tool_names: Vec<String>,
}

pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse>>>,
    fallback: Option<ModelResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the same response forever
    pub fn repeating(response: ModelResponse) -> Self {
        Self::new([]).with_fallback(response)
    }

    /// Response used once the script runs out
    pub fn with_fallback(mut self, response: ModelResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Queue a backend failure
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(Err(ChainError::ModelUnavailableError(message.into())));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<ModelResponse> {
        if request.messages.is_empty() {
            return Err(ChainError::ModelUnavailableError(
                "request carried no messages".to_string(),
            ));
        }

        lock(&self.requests).push(RecordedRequest {
            model: request.model.to_string(),
            messages: request.messages.to_vec(),
            schema_name: request.schema.map(|s| s.name.clone()),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
        });

        let next = lock(&self.script).pop_front();
        match next {
            Some(response) => response,
            None => self.fallback.clone().ok_or_else(|| {
                ChainError::ModelUnavailableError("scripted model exhausted".to_string())
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_exhausts() {
        let model = ScriptedModel::new([ModelResponse::text("one"), ModelResponse::text("two")]);
        let messages = vec![Message::user("go")];

        let first = model.invoke(ModelRequest::new("m", &messages)).await.unwrap();
        let second = model.invoke(ModelRequest::new("m", &messages)).await.unwrap();
        assert_eq!(first.content, "one");
        assert_eq!(second.content, "two");

        let third = model.invoke(ModelRequest::new("m", &messages)).await;
        assert!(matches!(third, Err(ChainError::ModelUnavailableError(_))));
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_fallback() {
        let model = ScriptedModel::new([])
            .then_fail("backend down")
            .with_fallback(ModelResponse::text("steady"));
        let messages = vec![Message::user("go")];

        assert!(model.invoke(ModelRequest::new("m", &messages)).await.is_err());
        let next = model.invoke(ModelRequest::new("m", &messages)).await.unwrap();
        assert_eq!(next.content, "steady");
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_messages_rejected() {
        let model = ScriptedModel::repeating(ModelResponse::text("x"));
        let result = model.invoke(ModelRequest::new("m", &[])).await;
        assert!(matches!(result, Err(ChainError::ModelUnavailableError(_))));
        assert_eq!(model.call_count(), 0);
    }
}
