//! Chain configuration
//!
//! Passed explicitly into `PromptChain::new`; nothing here is global.

use crate::error::ChainError;
use crate::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "llama3.1";
pub const DEFAULT_GATE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Model identifier forwarded with every request
    pub model: String,
    /// Minimum extraction confidence for the gate to pass
    pub gate_threshold: f64,
    /// Bound on model round-trips inside the tool dispatch loop
    pub max_tool_iterations: u32,
    /// Per-call bound on a model invocation
    pub model_timeout: Option<Duration>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            gate_threshold: DEFAULT_GATE_THRESHOLD,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            model_timeout: None,
        }
    }
}

impl ChainConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_gate_threshold(mut self, threshold: f64) -> Self {
        self.gate_threshold = threshold;
        self
    }

    pub fn with_max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gate_threshold) {
            return Err(ChainError::ConfigError(format!(
                "gate_threshold must be within [0, 1], got {}",
                self.gate_threshold
            )));
        }

        if self.max_tool_iterations == 0 {
            return Err(ChainError::ConfigError(
                "max_tool_iterations must be at least 1".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ChainError::ConfigError("model must not be empty".to_string()));
        }

        Ok(())
    }

    /// Load from `PROMPT_CHAIN_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(model) = env::var("PROMPT_CHAIN_MODEL") {
            config.model = model;
        }

        if let Ok(raw) = env::var("PROMPT_CHAIN_GATE_THRESHOLD") {
            config.gate_threshold = parse_var("PROMPT_CHAIN_GATE_THRESHOLD", &raw)?;
        }

        if let Ok(raw) = env::var("PROMPT_CHAIN_MAX_TOOL_ITERATIONS") {
            config.max_tool_iterations = parse_var("PROMPT_CHAIN_MAX_TOOL_ITERATIONS", &raw)?;
        }

        if let Ok(raw) = env::var("PROMPT_CHAIN_MODEL_TIMEOUT_SECS") {
            let secs: u64 = parse_var("PROMPT_CHAIN_MODEL_TIMEOUT_SECS", &raw)?;
            config.model_timeout = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ChainError::ConfigError(format!("{} has an invalid value: {}", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults_are_valid() {
        let config = ChainConfig::default();
        assert_eq!(config.gate_threshold, 0.7);
        assert_eq!(config.model, "llama3.1");
        assert_ok!(config.validate());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_err!(ChainConfig::default().with_gate_threshold(1.5).validate());
        assert_err!(ChainConfig::default().with_gate_threshold(-0.1).validate());
        assert_err!(ChainConfig::default().with_max_tool_iterations(0).validate());
        assert_err!(ChainConfig::default().with_model("  ").validate());
    }

    #[test]
    fn test_parse_var() {
        let threshold: f64 = assert_ok!(parse_var("X", " 0.85 "));
        assert_eq!(threshold, 0.85);
        assert_err!(parse_var::<u32>("X", "many"));
    }
}
