use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{parse_vector, Embedder};
use crate::core::errors::QaError;
use crate::llm::openai::build_client;

/// Embeddings from an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        proxy_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, QaError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
            client: build_client(proxy_url, timeout)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, QaError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": text,
            "encoding_format": "float",
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("OpenAI embedding request to {}", url))
            .map_err(QaError::Embedding)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::embedding(anyhow!(
                "OpenAI embed error: {} {}",
                status,
                text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .context("OpenAI embedding response is not JSON")
            .map_err(QaError::Embedding)?;

        parse_vector(&payload["data"][0]["embedding"])
            .ok_or_else(|| QaError::embedding(anyhow!("OpenAI returned no embedding")))
    }
}
