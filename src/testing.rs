//! Test doubles shared across module tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::errors::QaError;
use crate::embedding::Embedder;
use crate::llm::{ChatRequest, LlmProvider};

/// Chat backend that replays queued replies and records every request.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, QaError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    healthy: AtomicBool,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, QaError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn health_check(&self) -> Result<bool, QaError> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, QaError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QaError::model(anyhow::anyhow!("no scripted reply left"))))
    }
}

/// Deterministic bag-of-words embedder: texts sharing words point the same way.
pub struct StubEmbedder {
    dimension: usize,
    failing: bool,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failing: false,
        }
    }

    pub fn failing(dimension: usize) -> Self {
        Self {
            dimension,
            failing: true,
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x100000001b3)
                });
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, QaError> {
        if self.failing {
            return Err(QaError::embedding(anyhow::anyhow!("embedding backend down")));
        }
        Ok(self.vector_for(text))
    }
}
