use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the extraction, indexing and answering pipelines.
///
/// Backend variants keep the transport error as their source so the cause
/// survives into logs; `NoExtractablePair` and `NoAnswer` are expected
/// outcomes rather than faults.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("embedding backend failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("model backend failed: {0}")]
    Model(#[source] anyhow::Error),

    #[error("model backend unavailable: {0}")]
    ModelUnavailable(String),

    #[error("vector index failed: {0}")]
    Index(#[source] anyhow::Error),

    #[error("vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("no extractable Q&A pair")]
    NoExtractablePair,

    #[error("no grounded answer for query: {query}")]
    NoAnswer { query: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl QaError {
    pub fn embedding<E: Into<anyhow::Error>>(err: E) -> Self {
        QaError::Embedding(err.into())
    }

    pub fn model<E: Into<anyhow::Error>>(err: E) -> Self {
        QaError::Model(err.into())
    }

    pub fn index<E: Into<anyhow::Error>>(err: E) -> Self {
        QaError::Index(err.into())
    }

    pub fn persistence<E: Into<anyhow::Error>>(err: E) -> Self {
        QaError::Persistence(err.into())
    }

    /// True for failures of an external backend, as opposed to content outcomes.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            QaError::Embedding(_)
                | QaError::Model(_)
                | QaError::ModelUnavailable(_)
                | QaError::Index(_)
                | QaError::Persistence(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Qa(#[from] QaError),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid or missing authentication token" }),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An unexpected error occurred" }),
                )
            }
            ApiError::Qa(err) => qa_error_response(err),
        };

        (status, Json(body)).into_response()
    }
}

fn qa_error_response(err: &QaError) -> (StatusCode, serde_json::Value) {
    match err {
        QaError::NoExtractablePair => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": "no_extractable_pair", "message": err.to_string() }),
        ),
        QaError::NoAnswer { query } => (
            StatusCode::NOT_FOUND,
            json!({ "error": "no_answer", "query": query }),
        ),
        QaError::Embedding(_) | QaError::Model(_) | QaError::Index(_) => {
            tracing::error!("Backend failure: {:#}", anyhow_chain(err));
            (
                StatusCode::BAD_GATEWAY,
                json!({ "error": error_kind(err), "message": err.to_string() }),
            )
        }
        QaError::ModelUnavailable(_) | QaError::Persistence(_) => {
            tracing::error!("Service unavailable: {:#}", anyhow_chain(err));
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": error_kind(err), "message": err.to_string() }),
            )
        }
        QaError::DimensionMismatch { .. } | QaError::Config(_) => {
            tracing::error!("Configuration error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": error_kind(err), "message": err.to_string() }),
            )
        }
    }
}

fn error_kind(err: &QaError) -> &'static str {
    match err {
        QaError::Embedding(_) => "embedding_failure",
        QaError::Model(_) => "model_failure",
        QaError::ModelUnavailable(_) => "model_unavailable",
        QaError::Index(_) | QaError::DimensionMismatch { .. } => "index_failure",
        QaError::Persistence(_) => "persistence_failure",
        QaError::NoExtractablePair => "no_extractable_pair",
        QaError::NoAnswer { .. } => "no_answer",
        QaError::Config(_) => "config_error",
    }
}

fn anyhow_chain(err: &QaError) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_answer_maps_to_not_found_with_query() {
        let response = ApiError::from(QaError::NoAnswer {
            query: "how?".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn backend_failures_are_not_content_outcomes() {
        assert!(QaError::model(anyhow::anyhow!("timeout")).is_backend_failure());
        assert!(QaError::persistence(anyhow::anyhow!("locked")).is_backend_failure());
        assert!(!QaError::NoExtractablePair.is_backend_failure());
        assert!(!QaError::NoAnswer {
            query: String::new()
        }
        .is_backend_failure());
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (QaError::NoExtractablePair, StatusCode::UNPROCESSABLE_ENTITY),
            (
                QaError::embedding(anyhow::anyhow!("down")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                QaError::ModelUnavailable("probe failed".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                QaError::DimensionMismatch {
                    expected: 384,
                    actual: 1536,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn chain_preserves_transport_cause() {
        let err = QaError::index(anyhow::anyhow!("connection refused").context("qdrant upsert"));
        let chain = anyhow_chain(&err);
        assert!(chain.contains("qdrant upsert"));
        assert!(chain.contains("connection refused"));
    }
}
