use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{parse_vector, Embedder};
use crate::core::errors::QaError;

pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, QaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QaError::Config(format!("cannot build Ollama client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, QaError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": text,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama embedding request to {}", url))
            .map_err(QaError::Embedding)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::embedding(anyhow!(
                "Ollama embed error: {} {}",
                status,
                text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .context("Ollama embedding response is not JSON")
            .map_err(QaError::Embedding)?;

        parse_vector(&payload["embedding"])
            .ok_or_else(|| QaError::embedding(anyhow!("Ollama returned no embedding")))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    #[tokio::test]
    async fn embeds_prompt_with_configured_model() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/embeddings")
            .match_body(Matcher::Json(json!({
                "model": "all-minilm",
                "prompt": "How do I change my plan?"
            })))
            .with_status(200)
            .with_body(r#"{"embedding":[0.25,-0.5,1.0]}"#)
            .create_async()
            .await;

        let embedder =
            OllamaEmbedder::new(&server.url(), "all-minilm", 3, Duration::from_secs(2)).unwrap();
        let vector = embedder.embed("How do I change my plan?").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn missing_embedding_is_embedding_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/embeddings")
            .with_status(200)
            .with_body(r#"{"error":"model not found"}"#)
            .create_async()
            .await;

        let embedder =
            OllamaEmbedder::new(&server.url(), "missing", 3, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            embedder.embed("hi").await,
            Err(QaError::Embedding(_))
        ));
    }
}
