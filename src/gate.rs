//! Gate check on the first-stage extraction
//!
//! Pure and deterministic: no model call, no side effects. Rejection is a
//! normal outcome, not an error.

use crate::config::DEFAULT_GATE_THRESHOLD;
use crate::models::ExtractionResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum GateDecision {
    Pass,
    Reject { reason: String },
}

impl GateDecision {
    pub fn passed(&self) -> bool {
        matches!(self, GateDecision::Pass)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateEvaluator {
    threshold: f64,
}

impl GateEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn passes(&self, extraction: &ExtractionResult) -> bool {
        passes(extraction, self.threshold)
    }

    pub fn evaluate(&self, extraction: &ExtractionResult) -> GateDecision {
        if !extraction.is_valid_case {
            warn!(
                is_valid_case = extraction.is_valid_case,
                confidence = extraction.confidence_score,
                "Gate check failed: input is not a valid case"
            );
            return GateDecision::Reject {
                reason: "input is not a valid case".to_string(),
            };
        }

        if extraction.confidence_score < self.threshold {
            warn!(
                is_valid_case = extraction.is_valid_case,
                confidence = extraction.confidence_score,
                threshold = self.threshold,
                "Gate check failed: confidence below threshold"
            );
            return GateDecision::Reject {
                reason: format!(
                    "confidence {:.2} below threshold {:.2}",
                    extraction.confidence_score, self.threshold
                ),
            };
        }

        debug!(confidence = extraction.confidence_score, "Gate check passed");
        GateDecision::Pass
    }
}

impl Default for GateEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_THRESHOLD)
    }
}

/// Passes iff the case is valid and confidence reaches `threshold`
pub fn passes(extraction: &ExtractionResult, threshold: f64) -> bool {
    extraction.is_valid_case && extraction.confidence_score >= threshold
}
