use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::json::{extract_json_object, looks_like_json_fragment};
use super::prompts;
use super::sanitize::sanitize;
use super::types::{AnswerCandidate, Dialog, ExtractionCandidate};
use crate::core::config::ExtractionConfig;
use crate::core::errors::QaError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

/// Pulls a question, then its answer, out of a support dialog.
///
/// `Ok(None)` means the backend answered but nothing usable came back;
/// `Err` means the backend itself failed.
#[async_trait]
pub trait QaExtractor: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn extract_question(
        &self,
        dialog: &Dialog,
    ) -> Result<Option<ExtractionCandidate>, QaError>;

    async fn extract_answer(
        &self,
        question: &str,
        dialog: &Dialog,
    ) -> Result<Option<AnswerCandidate>, QaError>;
}

/// Prompt-driven extractor shared by every chat backend.
pub struct ModelExtractor {
    provider: Arc<dyn LlmProvider>,
    config: ExtractionConfig,
}

impl ModelExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, config: ExtractionConfig) -> Self {
        Self { provider, config }
    }

    async fn ensure_available(&self) -> Result<(), QaError> {
        if !self.config.probe_backend || self.is_available().await {
            return Ok(());
        }
        Err(QaError::ModelUnavailable(format!(
            "{} backend did not answer the liveness probe",
            self.provider.name()
        )))
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, QaError> {
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .json_mode(self.config.json_mode);
        self.provider.chat(request).await
    }
}

#[async_trait]
impl QaExtractor for ModelExtractor {
    async fn is_available(&self) -> bool {
        match self.provider.health_check().await {
            Ok(healthy) => healthy,
            Err(err) => {
                tracing::warn!("Liveness probe for {} failed: {}", self.provider.name(), err);
                false
            }
        }
    }

    async fn extract_question(
        &self,
        dialog: &Dialog,
    ) -> Result<Option<ExtractionCandidate>, QaError> {
        self.ensure_available().await?;
        let raw = self
            .complete(
                prompts::QUESTION_SYSTEM_PROMPT,
                prompts::question_user_prompt(dialog),
            )
            .await?;
        tracing::debug!("Question extraction raw output: {}", raw);
        Ok(parse_question_response(&raw, self.config.fallback_confidence))
    }

    async fn extract_answer(
        &self,
        question: &str,
        dialog: &Dialog,
    ) -> Result<Option<AnswerCandidate>, QaError> {
        self.ensure_available().await?;
        let raw = self
            .complete(
                prompts::ANSWER_SYSTEM_PROMPT,
                prompts::answer_user_prompt(question, dialog),
            )
            .await?;
        tracing::debug!("Answer extraction raw output: {}", raw);
        Ok(parse_answer_response(&raw, self.config.fallback_confidence))
    }
}

struct ParsedField {
    text: String,
    score: f64,
    source_text: Option<String>,
    index: Option<usize>,
}

struct Schema {
    text: &'static str,
    score: &'static str,
    index: &'static str,
    label: &'static str,
}

const QUESTION_SCHEMA: Schema = Schema {
    text: "question",
    score: "confidence",
    index: "position",
    label: "question:",
};

const ANSWER_SCHEMA: Schema = Schema {
    text: "answer",
    score: "relevance",
    index: "support_index",
    label: "answer:",
};

pub fn parse_question_response(raw: &str, fallback_confidence: f64) -> Option<ExtractionCandidate> {
    let parsed = parse_response(raw, &QUESTION_SCHEMA, fallback_confidence)?;
    Some(ExtractionCandidate {
        question: Some(parsed.text),
        confidence: parsed.score,
        source_text: parsed.source_text,
        position: parsed.index,
    })
}

pub fn parse_answer_response(raw: &str, fallback_relevance: f64) -> Option<AnswerCandidate> {
    let parsed = parse_response(raw, &ANSWER_SCHEMA, fallback_relevance)?;
    Some(AnswerCandidate {
        answer: Some(parsed.text),
        relevance: parsed.score,
        source_text: parsed.source_text,
        support_index: parsed.index,
    })
}

fn parse_response(raw: &str, schema: &Schema, fallback_score: f64) -> Option<ParsedField> {
    let text = sanitize(raw);
    if text.is_empty() || is_sentinel(&text) {
        return None;
    }

    if let Some(object) = extract_json_object(&text) {
        return parse_object(&object, schema, fallback_score);
    }

    let line = first_line(&text, schema.label)?;
    Some(ParsedField {
        text: line,
        score: fallback_score,
        source_text: None,
        index: None,
    })
}

/// A recovered object must carry the schema's text field; nothing is guessed.
fn parse_object(object: &Map<String, Value>, schema: &Schema, fallback_score: f64) -> Option<ParsedField> {
    let text = object
        .get(schema.text)
        .and_then(Value::as_str)
        .map(sanitize)
        .filter(|t| !t.is_empty() && !is_sentinel(t))?;

    let score = object
        .get(schema.score)
        .and_then(number)
        .map(|s| s.clamp(0.0, 1.0))
        .unwrap_or(fallback_score);

    let source_text = object
        .get("source_text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_sentinel(s))
        .map(str::to_string);

    let index = object
        .get(schema.index)
        .and_then(number)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
        .map(|n| n as usize);

    Some(ParsedField {
        text,
        score,
        source_text,
        index,
    })
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_line(text: &str, label: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = match line.get(..label.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(label) => line[label.len()..].trim(),
        _ => line,
    };
    let line = sanitize(line);
    if looks_like_json_fragment(&line) {
        tracing::debug!("Discarding unparseable structured output");
        return None;
    }
    (!line.is_empty() && !is_sentinel(&line)).then_some(line)
}

const SENTINELS: [&str; 4] = ["NO_QUESTION", "NO_ANSWER", "NONE", "NULL"];

/// True for the "nothing found" markers models emit, in any spelling variant:
/// `no answer`, `No-Question-Found`, `null.`.
pub fn is_sentinel(text: &str) -> bool {
    let normalized: String = text
        .trim()
        .trim_end_matches(['.', '!'])
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    let base = normalized.strip_suffix("_FOUND").unwrap_or(&normalized);
    SENTINELS.contains(&base)
}
