//! Knowledge search tool — ranked passage retrieval.
//!
//! Wraps a `KnowledgeStore` so the reasoning loop can ground answers in
//! stored documents. The store is just one tool among several; the loop
//! does not treat it specially.

use async_trait::async_trait;
use loopcraft_core::error::ToolError;
use loopcraft_core::knowledge::KnowledgeStore;
use loopcraft_core::tool::Tool;
use std::sync::Arc;
use tracing::debug;

pub struct KnowledgeSearchTool {
    store: Arc<dyn KnowledgeStore>,
}

impl KnowledgeSearchTool {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "knowledge_search"
    }

    fn description(&self) -> &str {
        "Search the knowledge store for relevant passages. Input: {\"query\": \"...\", \"limit\": 3}"
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let limit = arguments["limit"].as_u64().unwrap_or(3).min(10) as usize;

        let passages = self
            .store
            .search(query, limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "knowledge_search".into(),
                reason: e.to_string(),
            })?;

        debug!(query, results = passages.len(), "Knowledge search");

        if passages.is_empty() {
            return Ok("No relevant passages found.".into());
        }

        let rendered = passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. [score={:.2}] {}", i + 1, p.score, p.content))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(rendered)
    }
}
