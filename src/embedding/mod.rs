//! Text embedding backends.
//!
//! One long-lived `Arc<dyn Embedder>` is built at startup and shared by the
//! save, search and answer paths so questions and queries land in the same
//! vector space.

pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use crate::core::config::{EmbeddingBackend, EmbeddingConfig, LlmConfig};
use crate::core::errors::QaError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, QaError>;
}

/// Builds the embedder selected by `embedding.backend`. Connection details
/// default to the matching `llm` section.
pub fn build_embedder(
    config: &EmbeddingConfig,
    llm: &LlmConfig,
) -> Result<Arc<dyn Embedder>, QaError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let embedder: Arc<dyn Embedder> = match config.backend {
        EmbeddingBackend::Ollama => {
            let url = config.url.as_deref().unwrap_or(&llm.ollama.url);
            Arc::new(OllamaEmbedder::new(
                url,
                &config.model,
                config.dimension,
                timeout,
            )?)
        }
        EmbeddingBackend::OpenAi => {
            let api_key = llm
                .openai
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    QaError::Config("llm.openai.api_key is required for openai embeddings".into())
                })?;
            let url = config.url.as_deref().unwrap_or(&llm.openai.base_url);
            Arc::new(OpenAiEmbedder::new(
                url,
                api_key,
                &config.model,
                config.dimension,
                llm.openai.proxy_url.as_deref(),
                timeout,
            )?)
        }
    };

    tracing::info!(
        "Embedding backend: {:?} (model {}, dim {})",
        config.backend,
        config.model,
        embedder.dimension()
    );
    Ok(embedder)
}

/// Reads a JSON number array into an `f32` vector.
pub(crate) fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    let values = value.as_array()?;
    let vector: Vec<f32> = values
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect();
    (!vector.is_empty() && vector.len() == values.len()).then_some(vector)
}
