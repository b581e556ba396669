//! In-process knowledge store backends.
//!
//! `InMemoryStore` keeps submitted documents in a Vec and ranks passages by
//! keyword overlap. Useful for testing and ephemeral sessions where a real
//! document store isn't wired up.

use async_trait::async_trait;
use loopcraft_core::error::KnowledgeError;
use loopcraft_core::knowledge::{KnowledgeStore, Passage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct Document {
    source_id: String,
    content: String,
    metadata: HashMap<String, String>,
}

/// An in-memory store that ranks by keyword overlap with the query.
pub struct InMemoryStore {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Number of stored documents.
    pub async fn count(&self) -> usize {
        self.documents.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyword relevance: fraction of query words (lowercased, >2 chars) that
/// appear in the document.
fn keyword_score(query: &str, content: &str) -> f32 {
    let content_lower = content.to_lowercase();
    let words: Vec<_> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let matched = words.iter().filter(|w| content_lower.contains(*w)).count();
    matched as f32 / words.len() as f32
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn submit(
        &self,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, KnowledgeError> {
        let source_id = Uuid::new_v4().to_string();
        self.documents.write().await.push(Document {
            source_id: source_id.clone(),
            content: text.to_string(),
            metadata,
        });
        Ok(source_id)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Passage>, KnowledgeError> {
        let documents = self.documents.read().await;

        let mut results: Vec<Passage> = documents
            .iter()
            .filter_map(|d| {
                let score = keyword_score(query, &d.content);
                (score > 0.0).then(|| Passage {
                    source_id: d.source_id.clone(),
                    content: d.content.clone(),
                    score,
                    metadata: d.metadata.clone(),
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }
}
