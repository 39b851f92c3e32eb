//! Knowledge-base question answering over a caller-supplied record set

use crate::chain::ChainDomain;
use crate::dispatch::DispatchOutcome;
use crate::error::ChainError;
use crate::models::Message;
use crate::schema::{FieldType, StructuredOutput, StructuredSchema};
use crate::tools::{Tool, ToolRegistry};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub const SEARCH_KB: &str = "search_kb";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeRecord {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeQuery {
    pub question: String,
}

impl StructuredOutput for KnowledgeQuery {
    fn schema() -> StructuredSchema {
        StructuredSchema::new("KnowledgeQuery").required(
            "question",
            FieldType::String,
            "The user's question, restated on its own",
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeAnswer {
    pub answer: String,
    /// Record id the answer came from, absent when the knowledge base was not used
    pub source: Option<i64>,
}

impl StructuredOutput for KnowledgeAnswer {
    fn schema() -> StructuredSchema {
        StructuredSchema::new("KnowledgeAnswer")
            .required("answer", FieldType::String, "The answer to the user's question")
            .optional("source", FieldType::Integer, "The record id of the answer")
    }
}

//
// ================= Tool =================
//

/// Keyword search over an in-memory record set
pub struct SearchKbTool {
    records: Arc<Vec<KnowledgeRecord>>,
}

impl SearchKbTool {
    pub fn new(records: Vec<KnowledgeRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// Records sharing at least one keyword with the question, best first
    pub fn search(&self, question: &str) -> Vec<KnowledgeRecord> {
        let wanted = keywords(question);
        let mut scored: Vec<(usize, &KnowledgeRecord)> = self
            .records
            .iter()
            .map(|record| {
                let text = format!("{} {}", record.question, record.answer);
                (keywords(&text).intersection(&wanted).count(), record)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.id.cmp(&b.1.id)));
        scored.into_iter().map(|(_, record)| record.clone()).collect()
    }
}

const STOPWORDS: &[&str] = &[
    "what", "when", "where", "which", "who", "your", "does", "with", "have", "that", "this",
    "from", "about", "there",
];

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[async_trait::async_trait]
impl Tool for SearchKbTool {
    fn name(&self) -> &str {
        SEARCH_KB
    }

    fn description(&self) -> &str {
        "Get the answer to the user's question from the knowledge base."
    }

    fn parameters(&self) -> StructuredSchema {
        StructuredSchema::new("search_kb_args").required("question", FieldType::String, "")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value> {
        let question = arguments
            .get("question")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::tool(SEARCH_KB, "question must be a string"))?;

        let records = self.search(question);
        Ok(json!({ "records": records }))
    }
}

/// Registry holding `search_kb` over the given records
pub fn knowledge_registry(records: Vec<KnowledgeRecord>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchKbTool::new(records)))?;
    Ok(registry)
}

//
// ================= Domain =================
//

pub struct KnowledgeDomain {
    subject: String,
}

impl KnowledgeDomain {
    /// `subject` describes what the knowledge base covers, e.g. "our e-commerce store"
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    fn assistant_prompt(&self) -> String {
        format!(
            "You are a helpful assistant that answers questions from the knowledge base about {}.",
            self.subject
        )
    }
}

impl ChainDomain for KnowledgeDomain {
    type Detail = KnowledgeQuery;
    type Final = KnowledgeAnswer;

    fn name(&self) -> &str {
        "knowledge"
    }

    fn extraction_prompt(&self) -> String {
        "Analyze if the text is a question that can be answered, and provide a confidence \
         score. Store the question as the description."
            .to_string()
    }

    fn detail_prompt(&self) -> String {
        "Restate the user's question so it can be answered on its own.".to_string()
    }

    fn dispatch_seed(&self, detail: &KnowledgeQuery) -> Option<Vec<Message>> {
        Some(vec![
            Message::system(self.assistant_prompt()),
            Message::user(detail.question.clone()),
        ])
    }

    /// The dispatch conversation as-is, so the answer sees any retrieved records
    fn confirmation_messages(
        &self,
        detail: &KnowledgeQuery,
        dispatch: Option<&DispatchOutcome>,
    ) -> Vec<Message> {
        match dispatch {
            Some(outcome) => outcome.messages.clone(),
            None => vec![
                Message::system(self.assistant_prompt()),
                Message::user(detail.question.clone()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::PromptChain;
    use crate::config::ChainConfig;
    use crate::model::ScriptedModel;
    use crate::models::{ModelResponse, Role, ToolCallRequest, ToolOutcome};
    use tokio_test::assert_ok;

    fn store_kb() -> Vec<KnowledgeRecord> {
        vec![
            KnowledgeRecord {
                id: 1,
                question: "What is the return policy?".to_string(),
                answer: "Items can be returned within 30 days of purchase.".to_string(),
            },
            KnowledgeRecord {
                id: 2,
                question: "Do you ship internationally?".to_string(),
                answer: "We ship to over 50 countries worldwide.".to_string(),
            },
        ]
    }

    fn extraction(question: &str) -> ModelResponse {
        ModelResponse::structured(json!({
            "description": question,
            "is_valid_case": true,
            "confidence_score": 0.9,
        }))
    }

    #[test]
    fn test_search_matches_keywords() {
        let tool = SearchKbTool::new(store_kb());

        let hits = tool.search("what's your return policy?");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);

        assert!(tool.search("What is the weather in Tokyo?").is_empty());
    }

    #[test]
    fn test_knowledge_registry_declares_search_kb() {
        let registry = assert_ok!(knowledge_registry(store_kb()));
        assert_eq!(registry.list(), vec![SEARCH_KB]);
        assert!(registry.resolve(SEARCH_KB).is_some());
    }

    #[tokio::test]
    async fn test_answer_from_knowledge_base() {
        let model = Arc::new(ScriptedModel::new([
            extraction("What is the return policy?"),
            ModelResponse::structured(json!({ "question": "What is the return policy?" })),
            ModelResponse::tool_calls(vec![ToolCallRequest::new(
                SEARCH_KB,
                json!({ "question": "return policy" }),
            )]),
            ModelResponse::text("Returns are accepted within 30 days."),
            ModelResponse::structured(json!({
                "answer": "Items can be returned within 30 days of purchase.",
                "source": 1,
            })),
        ]));

        let chain = PromptChain::new(
            ChainConfig::default(),
            model.clone(),
            Arc::new(knowledge_registry(store_kb()).unwrap()),
            KnowledgeDomain::new("our e-commerce store"),
        )
        .unwrap();

        let report = assert_ok!(chain.execute("What is the return policy?").await);
        assert_eq!(report.tool_results.len(), 1);
        assert_eq!(report.tool_results[0].outcome, ToolOutcome::Success);
        assert_eq!(report.tool_results[0].output["records"][0]["id"], json!(1));

        let answer = report.outcome.unwrap();
        assert_eq!(answer.source, Some(1));

        // The terminal call carried the retrieved record
        let requests = model.requests();
        let confirm = requests.last().unwrap();
        assert!(confirm
            .messages
            .iter()
            .any(|m| m.role == Role::Tool && m.content.contains("30 days")));
    }

    #[tokio::test]
    async fn test_question_without_applicable_tool() {
        let model = Arc::new(ScriptedModel::new([
            extraction("What is the weather in Tokyo?"),
            ModelResponse::structured(json!({ "question": "What is the weather in Tokyo?" })),
            ModelResponse::text("I can only answer questions about the store."),
            ModelResponse::structured(json!({
                "answer": "I can only answer questions about the store.",
            })),
        ]));

        let chain = PromptChain::new(
            ChainConfig::default(),
            model.clone(),
            Arc::new(knowledge_registry(store_kb()).unwrap()),
            KnowledgeDomain::new("our e-commerce store"),
        )
        .unwrap();

        let report = assert_ok!(chain.execute("What is the weather in Tokyo?").await);
        let answer = report.outcome.unwrap();
        assert_eq!(answer.source, None);
        assert!(!answer.answer.is_empty());

        assert!(report.tool_results.is_empty());
        assert!(report.transcript.iter().all(|m| m.role != Role::Tool));
        assert_eq!(model.call_count(), 4);
    }
}
