//! Gated Prompt Chain
//!
//! A multi-stage orchestration pipeline over a generative model:
//! - Every stage output is validated against a named structured schema
//! - A deterministic gate rejects off-topic or low-confidence input early
//! - A bounded tool dispatch loop runs registered tools on the model's behalf
//! - Each invocation is traced and fingerprinted for replay comparison
//!
//! CHAIN:
//! INPUT → EXTRACT → GATE → DETAIL → DISPATCH? → CONFIRM → COMPLETE

pub mod audit;
pub mod chain;
pub mod config;
pub mod dispatch;
pub mod domains;
pub mod error;
pub mod gate;
pub mod model;
pub mod models;
pub mod schema;
pub mod tools;

pub use error::{ChainError, Result};

// Re-export common types
pub use chain::{ChainDomain, ChainReport, PromptChain};
pub use config::ChainConfig;
pub use dispatch::{DispatchOutcome, ToolDispatchLoop};
pub use gate::{GateDecision, GateEvaluator};
pub use model::{ModelInvoker, ModelRequest, ScriptedModel};
pub use models::*;
pub use schema::{FieldType, SchemaValidator, StructuredOutput, StructuredSchema};
pub use tools::{Tool, ToolRegistry};
