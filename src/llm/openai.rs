use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::QaError;

/// Hosted model behind an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        proxy_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, QaError> {
        let client = build_client(proxy_url, timeout)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }
}

/// Shared by the chat and embedding clients so both honour the same proxy.
pub(crate) fn build_client(proxy_url: Option<&str>, timeout: Duration) -> Result<Client, QaError> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url.filter(|p| !p.trim().is_empty()) {
        let proxy = Proxy::all(proxy)
            .map_err(|e| QaError::Config(format!("invalid proxy URL '{}': {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| QaError::Config(format!("cannot build OpenAI client: {}", e)))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool, QaError> {
        let url = format!("{}/v1/models", self.base_url);
        let res = self.client.get(&url).bearer_auth(&self.api_key).send().await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(err) => {
                tracing::debug!("OpenAI health check failed: {}", err);
                Ok(false)
            }
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, QaError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.top_p { obj.insert("top_p".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
            if request.json_mode {
                obj.insert("response_format".to_string(), json!({ "type": "json_object" }));
            }
        }

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("OpenAI chat request to {}", url))
            .map_err(QaError::Model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::model(anyhow!(
                "OpenAI chat error: {} {}",
                status,
                text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .context("OpenAI chat response is not JSON")
            .map_err(QaError::Model)?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;
    use crate::llm::types::ChatMessage;

    fn provider(url: &str) -> OpenAiProvider {
        OpenAiProvider::new(url, "sk-test", "gpt-4", None, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn chat_authenticates_and_requests_json_object() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4",
                "temperature": 0.2,
                "response_format": { "type": "json_object" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  {\"answer\":\"Go to Billing\"}  "}}]}"#)
            .create_async()
            .await;

        let request = ChatRequest::new(vec![
            ChatMessage::system("Reply in JSON."),
            ChatMessage::user("How?"),
        ])
        .temperature(0.2)
        .json_mode(true);

        let content = provider(&server.url()).chat(request).await.unwrap();
        assert_eq!(content, r#"{"answer":"Go to Billing"}"#);
    }

    #[tokio::test]
    async fn plain_requests_omit_response_format() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("^((?!response_format).)*$".to_string()))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"NO_ANSWER"}}]}"#)
            .create_async()
            .await;

        let content = provider(&server.url())
            .chat(ChatRequest::new(vec![ChatMessage::user("?")]))
            .await
            .unwrap();
        assert_eq!(content, "NO_ANSWER");
    }

    #[tokio::test]
    async fn unauthorized_is_model_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .chat(ChatRequest::new(vec![ChatMessage::user("?")]))
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::Model(_)));
    }

    #[test]
    fn invalid_proxy_is_config_error() {
        let result = OpenAiProvider::new(
            "https://api.openai.com",
            "sk",
            "gpt-4",
            Some("not a url"),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(QaError::Config(_))));
    }
}
