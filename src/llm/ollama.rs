use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::QaError;

/// Local model served by Ollama's native chat API.
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, QaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QaError::Config(format!("cannot build Ollama client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut options = serde_json::Map::new();
        if let Some(t) = request.temperature {
            options.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.top_p {
            options.insert("top_p".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            options.insert("num_predict".to_string(), json!(t));
        }

        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
            "options": options,
        });
        if request.json_mode {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("format".to_string(), json!("json"));
            }
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool, QaError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(err) => {
                tracing::debug!("Ollama health check failed: {}", err);
                Ok(false)
            }
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, QaError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_body(&request);

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama chat request to {}", url))
            .map_err(QaError::Model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::model(anyhow!(
                "Ollama chat error: {} {}",
                status,
                text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .context("Ollama chat response is not JSON")
            .map_err(QaError::Model)?;

        payload["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| QaError::model(anyhow!("Ollama chat response has no message content")))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;
    use crate::llm::types::ChatMessage;

    fn provider(url: &str) -> OllamaProvider {
        OllamaProvider::new(url, "gemma2:2b", Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn chat_sends_json_format_and_returns_content() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::PartialJson(json!({
                "model": "gemma2:2b",
                "stream": false,
                "format": "json",
                "options": { "temperature": 0.0, "num_predict": 64 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":{"role":"assistant","content":"{\"question\":\"Why?\"}"}}"#)
            .create_async()
            .await;

        let request = ChatRequest::new(vec![ChatMessage::user("hi")])
            .temperature(0.0)
            .max_tokens(64)
            .json_mode(true);
        let content = provider(&server.url()).chat(request).await.unwrap();
        assert_eq!(content, r#"{"question":"Why?"}"#);
    }

    #[tokio::test]
    async fn non_success_status_is_model_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let err = provider(&server.url())
            .chat(ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::Model(_)));
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn health_check_reports_unreachable_backend() {
        let healthy = {
            let mut server = Server::new_async().await;
            let _m = server
                .mock("GET", "/api/tags")
                .with_status(200)
                .with_body(r#"{"models":[]}"#)
                .create_async()
                .await;
            provider(&server.url()).health_check().await.unwrap()
        };
        assert!(healthy);

        let unreachable = provider("http://127.0.0.1:9").health_check().await.unwrap();
        assert!(!unreachable);
    }
}
