//! Knowledge store adapters.
//!
//! The core only ever inserts batches and runs filtered similarity searches;
//! identifiers and vectors stay inside the adapters.

mod memory;
mod qdrant;

use async_trait::async_trait;

use crate::document::KnowledgeUnit;
use crate::error::RagError;
use crate::filter::TopicFilter;

pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Persists the whole batch or nothing. Fails with [`RagError::StoreWrite`].
    async fn insert(&self, units: &[KnowledgeUnit]) -> Result<(), RagError>;

    /// Returns at most `top_k` units passing `filter`, most similar first.
    /// Fails with [`RagError::StoreRead`].
    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&TopicFilter>,
    ) -> Result<Vec<KnowledgeUnit>, RagError>;
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
