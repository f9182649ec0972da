use std::time::Duration;

use thiserror::Error;

/// Errors raised by the retrieval, ingestion and generation layers.
#[derive(Debug, Error)]
pub enum RagError {
    /// The knowledge store rejected or could not persist a write.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// The similarity search against the knowledge store failed.
    #[error("store read failed: {0}")]
    StoreRead(String),

    /// The embedding backend failed or returned vectors of the wrong shape.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation backend failed or returned an unusable result.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A bounded backend call exceeded its deadline.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// Ingestion input was rejected before anything was written.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Startup configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}
