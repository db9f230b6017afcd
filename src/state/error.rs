use thiserror::Error;

use crate::core::errors::QaError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize model provider: {0}")]
    Llm(#[source] QaError),

    #[error("Failed to initialize embedder: {0}")]
    Embedding(#[source] QaError),

    #[error("Failed to initialize vector index: {0}")]
    Index(#[source] QaError),

    #[error("Failed to initialize Q&A store: {0}")]
    Store(#[source] QaError),

    #[error("Database URL is not configured")]
    MissingDatabaseUrl,
}
