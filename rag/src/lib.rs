mod assistant;
mod config;
mod context;
mod document;
mod embed;
mod error;
mod filter;
mod generate;
mod http;
mod ingest;
mod prompt;
mod retrieve;
mod seed;
mod store;

use std::sync::Arc;

pub use assistant::{Answer, TaxAssistant, FALLBACK_MESSAGE};
pub use config::{Config, StoreBackend, DEFAULT_PERSONA};
pub use context::{assemble, GENERAL_INFO_HEADER, QA_HEADER};
pub use document::{DocumentType, KnowledgeUnit};
pub use embed::{Embedder, OllamaEmbedder};
pub use error::RagError;
pub use filter::{matches_query, RetrievalQuery, TopicFilter};
pub use generate::{Generator, OllamaChat};
pub use http::HttpError;
pub use ingest::{DocumentBatch, Ingestor, NewDocument, QaPair, TaxSection};
pub use prompt::{compose_prompt, Message, DEFAULT_SECTION, DEFAULT_SUBSECTION, NO_CONTEXT};
pub use retrieve::{partition, RetrievalLimits, RetrievalResult, Retriever};
pub use seed::{builtin_sections, load_knowledge, scan_sections};
pub use store::{InMemoryStore, KnowledgeStore, QdrantStore};

/// The long-lived handles shared by every request.
#[derive(Clone)]
pub struct Service {
    pub assistant: Arc<TaxAssistant>,
    pub ingestor: Ingestor,
}

impl Service {
    /// Wires a service around already-constructed backends.
    pub fn new(cfg: &Config, store: Arc<dyn KnowledgeStore>, generator: Arc<dyn Generator>) -> Self {
        let retriever = Retriever::new(
            Arc::clone(&store),
            RetrievalLimits::from_config(cfg),
            cfg.search_timeout,
        );
        Self {
            assistant: Arc::new(TaxAssistant::from_config(cfg, retriever, generator)),
            ingestor: Ingestor::new(store),
        }
    }

    /// Builds the Ollama clients and the configured store adapter.
    pub fn from_config(cfg: &Config) -> Result<Self, RagError> {
        let client = http::build_client(cfg.http_timeout)
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;
        let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(
            client.clone(),
            cfg.ollama_url.clone(),
            cfg.embed_model.clone(),
        ));
        let store: Arc<dyn KnowledgeStore> = match cfg.store {
            StoreBackend::Qdrant => Arc::new(QdrantStore::new(
                client.clone(),
                cfg.qdrant_url.clone(),
                cfg.collection.clone(),
                cfg.distance.clone(),
                embedder,
            )),
            StoreBackend::Memory => Arc::new(InMemoryStore::new(embedder)),
        };
        let generator: Arc<dyn Generator> =
            Arc::new(OllamaChat::new(client, cfg.ollama_url.clone(), cfg.chat_model.clone()));
        Ok(Self::new(cfg, store, generator))
    }

    /// Seeds the store per `RAG_SEED_KNOWLEDGE` / `RAG_KNOWLEDGE_DIR`.
    pub async fn seed(&self, cfg: &Config) -> Result<usize, RagError> {
        load_knowledge(&self.ingestor, cfg.seed_knowledge, cfg.knowledge_dir.as_deref()).await
    }
}
