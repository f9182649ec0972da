use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::config::Config;
use crate::document::{DocumentType, KnowledgeUnit};
use crate::error::RagError;
use crate::filter::RetrievalQuery;
use crate::store::KnowledgeStore;

/// How many hits to request and how many of each type to keep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrievalLimits {
    pub top_k: usize,
    pub general_info: usize,
    pub qa_pairs: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            top_k: 8,
            general_info: 2,
            qa_pairs: 4,
        }
    }
}

impl RetrievalLimits {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            top_k: cfg.top_k,
            general_info: cfg.general_info_limit,
            qa_pairs: cfg.qa_limit,
        }
    }
}

/// Search hits split by type, each partition in store rank order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetrievalResult {
    pub general_info: Vec<KnowledgeUnit>,
    pub qa_pairs: Vec<KnowledgeUnit>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.general_info.is_empty() && self.qa_pairs.is_empty()
    }
}

/// Splits ranked hits into capped general-info and Q&A partitions; other types are dropped.
pub fn partition(hits: Vec<KnowledgeUnit>, limits: &RetrievalLimits) -> RetrievalResult {
    let mut result = RetrievalResult::default();
    for unit in hits {
        match unit.doc_type {
            DocumentType::GeneralInfo if result.general_info.len() < limits.general_info => {
                result.general_info.push(unit)
            }
            DocumentType::QaPair if result.qa_pairs.len() < limits.qa_pairs => {
                result.qa_pairs.push(unit)
            }
            DocumentType::GeneralInfo | DocumentType::QaPair | DocumentType::Other => {}
        }
    }
    result
}

pub struct Retriever {
    store: Arc<dyn KnowledgeStore>,
    limits: RetrievalLimits,
    search_timeout: Duration,
}

impl Retriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, limits: RetrievalLimits, search_timeout: Duration) -> Self {
        Self {
            store,
            limits,
            search_timeout,
        }
    }

    /// Filtered similarity search followed by type partitioning. Never retries.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalResult, RagError> {
        let filter = query.topic_filter();
        let search = self
            .store
            .search(&query.query_text, self.limits.top_k, Some(&filter));
        let hits = timeout(self.search_timeout, search)
            .await
            .map_err(|_| RagError::Timeout {
                operation: "knowledge search",
                duration: self.search_timeout,
            })??;

        let hit_count = hits.len();
        let result = partition(hits, &self.limits);
        debug!(
            hits = hit_count,
            general_info = result.general_info.len(),
            qa_pairs = result.qa_pairs.len(),
            section = ?query.section,
            subsection = ?query.subsection,
            "retrieved knowledge"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc_type: DocumentType, n: usize) -> KnowledgeUnit {
        KnowledgeUnit::new(format!("{}-{n}", doc_type.as_str()), doc_type, Some("Income"), None)
    }

    #[test]
    fn caps_each_partition_in_rank_order() {
        let mut hits = Vec::new();
        for n in 0..10 {
            hits.push(hit(DocumentType::QaPair, n));
            hits.push(hit(DocumentType::GeneralInfo, n));
        }
        let result = partition(hits, &RetrievalLimits::default());
        let contents = |units: &[KnowledgeUnit]| units.iter().map(|u| u.content.clone()).collect::<Vec<_>>();
        assert_eq!(contents(&result.general_info), vec!["general_info-0", "general_info-1"]);
        assert_eq!(
            contents(&result.qa_pairs),
            vec!["qa_pair-0", "qa_pair-1", "qa_pair-2", "qa_pair-3"]
        );
    }

    #[test]
    fn other_types_are_dropped() {
        let hits = vec![hit(DocumentType::Other, 0), hit(DocumentType::QaPair, 1)];
        let result = partition(hits, &RetrievalLimits::default());
        assert!(result.general_info.is_empty());
        assert_eq!(result.qa_pairs.len(), 1);
    }

    #[test]
    fn empty_hits_are_an_empty_result() {
        assert!(partition(vec![], &RetrievalLimits::default()).is_empty());
    }
}
