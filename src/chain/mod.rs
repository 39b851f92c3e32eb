//! Prompt chain orchestrator - implements the gated pipeline
//!
//! INPUT → EXTRACT → GATE → DETAIL → DISPATCH? → CONFIRM → COMPLETE
//!
//! Every stage output passes through the schema validator before anything
//! downstream sees it. A gate rejection ends the chain with no result and
//! is not an error.

use crate::audit::transcript_hash;
use crate::config::ChainConfig;
use crate::dispatch::{DispatchOutcome, ToolDispatchLoop};
use crate::gate::{GateDecision, GateEvaluator};
use crate::model::{invoke_bounded, ModelInvoker, ModelRequest};
use crate::models::{ExtractionResult, Message, ToolCallResult, ToolDeclaration};
use crate::schema::{SchemaValidator, StructuredOutput};
use crate::tools::ToolRegistry;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Domain payload plugged into the fixed chain structure
pub trait ChainDomain: Send + Sync {
    /// Stage-2 output
    type Detail: StructuredOutput;
    /// Terminal stage output
    type Final: StructuredOutput;

    fn name(&self) -> &str;

    /// System prompt for the stage-1 extraction
    fn extraction_prompt(&self) -> String;

    /// System prompt for stage-2 detail parsing
    fn detail_prompt(&self) -> String;

    /// Seed conversation for the tool dispatch loop.
    /// `None` skips the loop.
    fn dispatch_seed(&self, _detail: &Self::Detail) -> Option<Vec<Message>> {
        None
    }

    /// Tools offered to the model during dispatch
    fn tool_declarations(&self, registry: &ToolRegistry) -> Vec<ToolDeclaration> {
        registry.declarations()
    }

    /// Context for the terminal stage
    fn confirmation_messages(
        &self,
        detail: &Self::Detail,
        dispatch: Option<&DispatchOutcome>,
    ) -> Vec<Message>;
}

/// Everything observed during one invocation
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport<F> {
    pub run_id: Uuid,
    pub domain: String,
    pub extraction: ExtractionResult,
    pub gate: GateDecision,
    /// Validated stage-2 value, absent on gate rejection
    pub detail: Option<Value>,
    /// Absent only when the gate rejected the input
    pub outcome: Option<F>,
    /// Per-stage messages and responses, in order
    pub transcript: Vec<Message>,
    pub transcript_hash: String,
    pub tool_results: Vec<ToolCallResult>,
    pub reasoning_trace: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// Main orchestrator for one domain
pub struct PromptChain<D: ChainDomain> {
    config: ChainConfig,
    invoker: Arc<dyn ModelInvoker>,
    registry: Arc<ToolRegistry>,
    domain: D,
    gate: GateEvaluator,
    dispatch: ToolDispatchLoop,
}

impl<D: ChainDomain> PromptChain<D> {
    pub fn new(
        config: ChainConfig,
        invoker: Arc<dyn ModelInvoker>,
        registry: Arc<ToolRegistry>,
        domain: D,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            gate: GateEvaluator::new(config.gate_threshold),
            dispatch: ToolDispatchLoop::from_config(&config),
            config,
            invoker,
            registry,
            domain,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// Run the chain. `Ok(None)` means the gate rejected the input.
    pub async fn run(&self, user_input: &str) -> Result<Option<D::Final>> {
        Ok(self.execute(user_input).await?.outcome)
    }

    /// Run the chain and keep the full record of the invocation
    pub async fn execute(&self, user_input: &str) -> Result<ChainReport<D::Final>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("prompt_chain", run_id = %run_id, domain = %self.domain.name());

        self.execute_inner(run_id, user_input).instrument(span).await
    }

    async fn execute_inner(&self, run_id: Uuid, user_input: &str) -> Result<ChainReport<D::Final>> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut transcript = Vec::new();
        let mut reasoning_trace = Vec::new();

        info!(input_len = user_input.len(), "Prompt chain: starting");
        reasoning_trace.push("INPUT: request received".to_string());

        // === EXTRACT ===
        let extraction: ExtractionResult = self
            .structured_stage(
                "extract",
                vec![
                    Message::system(self.domain.extraction_prompt()),
                    Message::user(user_input),
                ],
                &mut transcript,
            )
            .await?;

        info!(
            is_valid_case = extraction.is_valid_case,
            confidence = extraction.confidence_score,
            "Extraction complete"
        );
        reasoning_trace.push(format!(
            "EXTRACT: valid_case={} confidence={:.2}",
            extraction.is_valid_case, extraction.confidence_score
        ));

        // === GATE ===
        let gate = self.gate.evaluate(&extraction);
        if let GateDecision::Reject { reason } = &gate {
            reasoning_trace.push(format!("GATE: rejected ({})", reason));

            return Ok(ChainReport {
                run_id,
                domain: self.domain.name().to_string(),
                extraction,
                gate,
                detail: None,
                outcome: None,
                transcript_hash: transcript_hash(&transcript),
                transcript,
                tool_results: Vec::new(),
                reasoning_trace,
                started_at,
                execution_time_ms: start.elapsed().as_millis() as u64,
            });
        }
        reasoning_trace.push("GATE: passed".to_string());

        // === DETAIL ===
        let detail: D::Detail = self
            .structured_stage(
                "detail",
                vec![
                    Message::system(self.domain.detail_prompt()),
                    Message::user(extraction.description.clone()),
                ],
                &mut transcript,
            )
            .await?;

        let detail_value = serde_json::to_value(&detail)?;
        debug!(detail = %detail_value, "Detail parsed");
        reasoning_trace.push(format!("DETAIL: {} parsed", D::Detail::schema().name));

        // === DISPATCH ===
        let dispatch = match self.domain.dispatch_seed(&detail) {
            Some(seed) => {
                let tools = self.domain.tool_declarations(&self.registry);
                let outcome = self
                    .dispatch
                    .run(self.invoker.as_ref(), seed, &tools, &self.registry)
                    .await?;

                reasoning_trace.push(format!(
                    "DISPATCH: {} tool call(s) over {} iteration(s)",
                    outcome.results.len(),
                    outcome.iterations
                ));
                transcript.extend(outcome.messages.iter().cloned());
                Some(outcome)
            }
            None => None,
        };

        // === CONFIRM ===
        let final_result: D::Final = self
            .structured_stage(
                "confirm",
                self.domain.confirmation_messages(&detail, dispatch.as_ref()),
                &mut transcript,
            )
            .await?;

        reasoning_trace.push(format!("COMPLETE: {} produced", D::Final::schema().name));

        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!(execution_time_ms, "Prompt chain: complete");

        Ok(ChainReport {
            run_id,
            domain: self.domain.name().to_string(),
            extraction,
            gate,
            detail: Some(detail_value),
            outcome: Some(final_result),
            transcript_hash: transcript_hash(&transcript),
            transcript,
            tool_results: dispatch.map(|d| d.results).unwrap_or_default(),
            reasoning_trace,
            started_at,
            execution_time_ms,
        })
    }

    /// One model call constrained by `T`'s schema, validated before return
    async fn structured_stage<T: StructuredOutput>(
        &self,
        stage: &str,
        messages: Vec<Message>,
        transcript: &mut Vec<Message>,
    ) -> Result<T> {
        let schema = T::schema();
        debug!(stage, schema = %schema.name, "Invoking model");

        let request = ModelRequest::new(&self.config.model, &messages).with_schema(&schema);
        let response =
            invoke_bounded(self.invoker.as_ref(), request, self.config.model_timeout).await?;

        if !response.tool_call_requests.is_empty() {
            debug!(
                stage,
                ignored = response.tool_call_requests.len(),
                "Ignoring tool calls on a structured stage"
            );
        }

        let value = SchemaValidator::validate_as::<T>(&response.content)?;

        transcript.extend(messages);
        transcript.push(Message::assistant(response.content));

        Ok(value)
    }
}
