//! Concrete chain domains
//!
//! Each domain supplies its prompts, its stage-2 and terminal schemas, and
//! (optionally) the tools its dispatch stage may call. The chain structure
//! itself is shared.

pub mod calendar;
pub mod execution;
pub mod knowledge;

pub use calendar::{CalendarDomain, EventConfirmation, EventDetails};
pub use execution::{
    execution_registry, AddToArrayTool, ExecutionDetails, ExecutionDomain, ExecutionSummary,
    IntegerArray,
};
pub use knowledge::{
    knowledge_registry, KnowledgeAnswer, KnowledgeDomain, KnowledgeQuery, KnowledgeRecord,
    SearchKbTool,
};
