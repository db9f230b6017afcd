use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::QaError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "ollama", "openai")
    fn name(&self) -> &str;

    /// the model every request is sent to
    fn model(&self) -> &str;

    /// check if the provider is reachable
    async fn health_check(&self) -> Result<bool, QaError>;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, QaError>;
}
