use gated_prompt_chain::{
    domains::{
        execution_registry, knowledge_registry, CalendarDomain, ExecutionDomain, KnowledgeDomain,
        KnowledgeRecord,
    },
    ChainConfig, ModelResponse, PromptChain, ScriptedModel, ToolCallRequest, ToolRegistry,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn extraction(description: &str, is_valid_case: bool, confidence_score: f64) -> ModelResponse {
    ModelResponse::structured(json!({
        "description": description,
        "is_valid_case": is_valid_case,
        "confidence_score": confidence_score,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ChainConfig::from_env()?;
    info!(model = %config.model, threshold = config.gate_threshold, "Gated prompt chain demo");

    // Calendar: passes the gate, no tools
    let calendar_model = ScriptedModel::new([
        extraction("1h meeting next Tuesday at 2pm with Alice and Bob", true, 0.95),
        ModelResponse::structured(json!({
            "name": "Team Meeting",
            "date": "2025-01-14T14:00:00",
            "duration_minutes": 60,
            "participants": ["Alice", "Bob"],
        })),
        ModelResponse::structured(json!({
            "confirmation_message": "Team Meeting is booked for Tuesday at 2pm with Alice and Bob.",
        })),
    ]);
    let calendar = PromptChain::new(
        config.clone(),
        Arc::new(calendar_model),
        Arc::new(ToolRegistry::new()),
        CalendarDomain::new(),
    )?;

    match calendar
        .run("Let's schedule a 1h meeting next Tuesday at 2pm with Alice and Bob")
        .await?
    {
        Some(confirmation) => println!("Confirmation: {}", confirmation.confirmation_message),
        None => println!("This doesn't appear to be a calendar event request."),
    }

    // Execution: one tool round, then a summary
    let execution_model = ScriptedModel::new([
        extraction("Run the program 7 times", true, 0.92),
        ModelResponse::structured(json!({ "num_times_to_execute": 7 })),
        ModelResponse::tool_calls(vec![ToolCallRequest::new(
            "add_to_array",
            json!({ "num_times": 7 }),
        )]),
        ModelResponse::text("Executed."),
        ModelResponse::structured(json!({
            "array_state": "[0, 1, 2, 3, 4, 5, 6]",
            "command_summary": "Added to the array 7 times",
        })),
    ]);
    let execution = PromptChain::new(
        config.clone(),
        Arc::new(execution_model),
        Arc::new(execution_registry()?),
        ExecutionDomain,
    )?;

    let report = execution.execute("Run the program 7 times").await?;
    if let Some(summary) = &report.outcome {
        println!("Array state: {}", summary.array_state);
    }
    info!(
        run_id = %report.run_id,
        transcript_hash = %report.transcript_hash,
        trace = ?report.reasoning_trace,
        "Execution chain finished"
    );

    // Knowledge: gate rejects a question outside the store's scope
    let knowledge_model =
        ScriptedModel::new([extraction("What is the weather in Tokyo?", false, 0.85)]);
    let knowledge = PromptChain::new(
        config,
        Arc::new(knowledge_model),
        Arc::new(knowledge_registry(vec![KnowledgeRecord {
            id: 1,
            question: "What is the return policy?".to_string(),
            answer: "Items can be returned within 30 days of purchase.".to_string(),
        }])?),
        KnowledgeDomain::new("our e-commerce store"),
    )?;

    match knowledge.run("What is the weather in Tokyo?").await? {
        Some(answer) => println!("Answer: {}", answer.answer),
        None => println!("That question is outside the knowledge base."),
    }

    Ok(())
}
