//! Knowledge store trait — text + metadata in, ranked passages out.
//!
//! Used two ways: the knowledge_search tool retrieves ranked passages for a
//! query, and the stability loop submits verified artifacts as a
//! best-effort side effect (a failed submit never changes a loop result).

use crate::error::KnowledgeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A ranked passage returned from a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// The source document this passage came from.
    pub source_id: String,

    /// The passage text.
    pub content: String,

    /// Relevance score (higher is better).
    pub score: f32,

    /// Metadata attached at submit time.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The knowledge/document store.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Submit text with metadata; returns the assigned source id.
    async fn submit(
        &self,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> std::result::Result<String, KnowledgeError>;

    /// Return up to `limit` passages ranked by relevance to `query`.
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Passage>, KnowledgeError>;
}
