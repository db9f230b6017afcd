use std::sync::Arc;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use axum::http::HeaderMap;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;
use crate::core::errors::ApiError;
use crate::core::security::require_workspace;
use crate::pipeline::{SaveOutcome, SaveRequest, ScoredQa};

const MIN_QUESTION_CHARS: usize = 3;
const MAX_QUESTION_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = require_workspace(&headers, &state.registry)?;
    if payload.dialog.is_empty() {
        return Err(ApiError::BadRequest("dialog must not be empty".to_string()));
    }

    let ticket_id = payload.ticket_id;
    let body = match state.qa.save(&scope, payload).await? {
        SaveOutcome::Saved(pair) => json!({
            "status": "success",
            "message": format!("Ticket {} saved", ticket_id),
            "extracted_question": pair.question,
            "extracted_answer": pair.answer,
            "quality_score": pair.quality_score
        }),
        SaveOutcome::AlreadySaved(record) => json!({
            "status": "already_saved",
            "message": format!("Ticket {} was already saved", ticket_id),
            "extracted_question": record.question,
            "extracted_answer": record.answer,
            "quality_score": Value::Null
        }),
    };
    Ok(Json(body))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = require_workspace(&headers, &state.registry)?;
    let query = validated_question(&payload.question)?;

    let results = state.qa.search(&scope, &query, payload.top_k).await?;
    let total_found = results.len();
    Ok(Json(json!({
        "query": query,
        "results": results.iter().map(result_json).collect::<Vec<_>>(),
        "total_found": total_found
    })))
}

pub async fn answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = require_workspace(&headers, &state.registry)?;
    let query = validated_question(&payload.question)?;

    let grounded = state.qa.answer(&scope, &query, payload.top_k).await?;
    Ok(Json(json!({
        "query": grounded.query,
        "answer": grounded.answer,
        "sources": grounded.sources.iter().map(result_json).collect::<Vec<_>>(),
        "timestamp": Utc::now().to_rfc3339()
    })))
}

fn validated_question(raw: &str) -> Result<String, ApiError> {
    let question = raw.trim();
    let chars = question.chars().count();
    if !(MIN_QUESTION_CHARS..=MAX_QUESTION_CHARS).contains(&chars) {
        return Err(ApiError::BadRequest(format!(
            "question must be between {} and {} characters",
            MIN_QUESTION_CHARS, MAX_QUESTION_CHARS
        )));
    }
    Ok(question.to_string())
}

fn result_json(result: &ScoredQa) -> Value {
    json!({
        "question": result.question,
        "answer": result.answer,
        "similarity": result.similarity,
        "ticket_id": result.ticket_id
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_is_trimmed_and_bounded() {
        assert_eq!(validated_question("  How?  ").unwrap(), "How?");
        assert!(matches!(validated_question(" hi "), Err(ApiError::BadRequest(_))));
        assert!(validated_question(&"я".repeat(1000)).is_ok());
        assert!(validated_question(&"a".repeat(1001)).is_err());
    }
}
