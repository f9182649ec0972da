use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{cosine_similarity, KnowledgeStore};
use crate::document::KnowledgeUnit;
use crate::embed::Embedder;
use crate::error::RagError;
use crate::filter::TopicFilter;

struct StoredUnit {
    vector: Vec<f32>,
    unit: KnowledgeUnit,
}

/// Process-local store: cosine similarity over embeddings kept in memory.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    units: RwLock<Vec<StoredUnit>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            units: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.units.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.units.read().await.is_empty()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn insert(&self, units: &[KnowledgeUnit]) -> Result<(), RagError> {
        if units.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = units.iter().map(|u| u.content.clone()).collect();
        // Embed the whole batch before touching the list so a failure writes nothing.
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| RagError::StoreWrite(e.to_string()))?;
        if vectors.len() != units.len() {
            return Err(RagError::StoreWrite(format!(
                "expected {} embeddings, got {}",
                units.len(),
                vectors.len()
            )));
        }

        let mut guard = self.units.write().await;
        guard.extend(units.iter().cloned().zip(vectors).map(|(unit, vector)| StoredUnit {
            vector,
            unit,
        }));
        debug!(added = units.len(), total = guard.len(), "in-memory store updated");
        Ok(())
    }

    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&TopicFilter>,
    ) -> Result<Vec<KnowledgeUnit>, RagError> {
        if top_k == 0 {
            return Ok(vec![]);
        }
        let query = self
            .embedder
            .embed(&[query_text.to_string()])
            .await
            .map_err(|e| RagError::StoreRead(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::StoreRead("embedding returned no vector".to_string()))?;

        let guard = self.units.read().await;
        let mut scored: Vec<(f32, &KnowledgeUnit)> = guard
            .iter()
            .filter(|stored| filter.map_or(true, |f| f.matches(&stored.unit)))
            .map(|stored| (cosine_similarity(&query, &stored.vector), &stored.unit))
            .collect();
        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored.into_iter().map(|(_, unit)| unit.clone()).collect())
    }
}
