use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Typed view of `config.yml`. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub extraction: ExtractionConfig,
    pub quality: QualityConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub responder: ResponderConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Master token; requests bearing it act in `default_workspace`.
    pub api_token: String,
    /// workspace id -> token
    pub workspace_tokens: BTreeMap<String, String>,
    pub default_workspace: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            workspace_tokens: BTreeMap::new(),
            default_workspace: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmBackend {
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl LlmBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(LlmBackend::Ollama),
            "openai" => Some(LlmBackend::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmBackend,
    pub request_timeout_secs: u64,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::Ollama,
            request_timeout_secs: 60,
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "gemma2:2b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub proxy_url: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com".to_string(),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    /// Ask the backend for a JSON-typed response.
    pub json_mode: bool,
    /// Probe backend liveness before each extraction.
    pub probe_backend: bool,
    /// Confidence assigned to answers recovered from bare text lines.
    pub fallback_confidence: f64,
    pub min_question_confidence: f64,
    pub min_answer_relevance: f64,
    pub rule_based_fallback: bool,
    pub rule_based_confidence: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 256,
            json_mode: true,
            probe_backend: true,
            fallback_confidence: 0.7,
            min_question_confidence: 0.5,
            min_answer_relevance: 0.5,
            rule_based_fallback: true,
            rule_based_confidence: 0.6,
        }
    }
}

/// Weights of the heuristic quality scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_question_chars: usize,
    pub min_answer_chars: usize,
    pub question_mark_bonus: f64,
    pub interrogative_bonus: f64,
    pub missing_interrogative_penalty: f64,
    pub answer_tokens_bonus: f64,
    pub min_answer_tokens: usize,
    pub action_phrase_bonus: f64,
    pub overlap_bonus: f64,
    pub min_shared_tokens: usize,
    pub answer_length_bonus: f64,
    pub min_answer_length: usize,
    pub acceptance_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_question_chars: 5,
            min_answer_chars: 3,
            question_mark_bonus: 0.3,
            interrogative_bonus: 0.2,
            missing_interrogative_penalty: 0.3,
            answer_tokens_bonus: 0.3,
            min_answer_tokens: 3,
            action_phrase_bonus: 0.1,
            overlap_bonus: 0.2,
            min_shared_tokens: 1,
            answer_length_bonus: 0.1,
            min_answer_length: 20,
            acceptance_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingBackend {
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl EmbeddingBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(EmbeddingBackend::Ollama),
            "openai" => Some(EmbeddingBackend::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    /// Overrides the model backend URL for embeddings only.
    pub url: Option<String>,
    pub dimension: usize,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: "all-minilm".to_string(),
            url: None,
            dimension: 384,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Qdrant,
    Memory,
}

impl IndexBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "qdrant" => Some(IndexBackend::Qdrant),
            "memory" => Some(IndexBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub score_threshold: f32,
    pub request_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "qa_support".to_string(),
            default_top_k: 5,
            max_top_k: 50,
            score_threshold: 0.1,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    /// Evidence scoring below this is never shown to the model.
    pub min_relevance: f32,
    pub max_evidence: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            max_tokens: 512,
            min_relevance: 0.25,
            max_evidence: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite://…` URL; defaults to `qa_support.db` in the data dir.
    pub url: Option<String>,
}
