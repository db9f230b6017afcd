pub mod ollama;
pub mod openai;
pub mod provider;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};

use crate::core::config::{LlmBackend, LlmConfig};
use crate::core::errors::QaError;

/// Builds the chat backend selected by `llm.provider`.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, QaError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let provider: Arc<dyn LlmProvider> = match config.provider {
        LlmBackend::Ollama => Arc::new(OllamaProvider::new(
            &config.ollama.url,
            &config.ollama.model,
            timeout,
        )?),
        LlmBackend::OpenAi => {
            let api_key = config
                .openai
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    QaError::Config("llm.openai.api_key is required for the openai provider".into())
                })?;
            Arc::new(OpenAiProvider::new(
                &config.openai.base_url,
                api_key,
                &config.openai.model,
                config.openai.proxy_url.as_deref(),
                timeout,
            )?)
        }
    };

    tracing::info!(
        "LLM provider: {} (model {})",
        provider.name(),
        provider.model()
    );
    Ok(provider)
}
