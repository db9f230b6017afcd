//! Workspace-partitioned vector index.
//!
//! Every write tags its payload with the caller's workspace and every read
//! filters on that tag, so a query in one workspace never sees another
//! workspace's tickets.

pub mod in_memory;
pub mod qdrant;
pub mod similarity;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

pub use in_memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

use crate::core::config::{IndexBackend, IndexConfig};
use crate::core::errors::QaError;

/// Payload key carrying the workspace tag.
pub const WORKSPACE_KEY: &str = "workspace";
pub const TICKET_ID_KEY: &str = "ticket_id";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceScope(String);

impl WorkspaceScope {
    pub fn new(workspace: impl Into<String>) -> Self {
        Self(workspace.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub ticket_id: u64,
    pub score: f32,
    pub payload: Value,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Insert or overwrite the vector stored for `ticket_id` in `scope`.
    async fn upsert(
        &self,
        scope: &WorkspaceScope,
        ticket_id: u64,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<(), QaError>;

    /// At most `top_k` results from `scope` scoring at least `score_threshold`,
    /// best first.
    async fn search(
        &self,
        scope: &WorkspaceScope,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievalResult>, QaError>;

    /// Drops the vector for `ticket_id` in `scope`; a missing point is not an error.
    async fn remove(&self, scope: &WorkspaceScope, ticket_id: u64) -> Result<(), QaError>;

    async fn count(&self, scope: &WorkspaceScope) -> Result<usize, QaError>;
}

pub fn build_index(config: &IndexConfig, dimension: usize) -> Result<Arc<dyn VectorIndex>, QaError> {
    let index: Arc<dyn VectorIndex> = match config.backend {
        IndexBackend::Qdrant => Arc::new(QdrantIndex::new(
            &config.url,
            config.api_key.as_deref(),
            &config.collection,
            dimension,
            Duration::from_secs(config.request_timeout_secs),
        )?),
        IndexBackend::Memory => Arc::new(InMemoryIndex::new(dimension)),
    };
    tracing::info!("Vector index: {} (dim {})", index.name(), dimension);
    Ok(index)
}

/// Stable point id: the same ticket in the same workspace always maps to the
/// same point, while equal ticket ids in different workspaces never collide.
pub fn point_id(scope: &WorkspaceScope, ticket_id: u64) -> Uuid {
    let key = format!("{}:{}", scope.as_str(), ticket_id);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// Adds the workspace and ticket tags to a caller payload.
pub(crate) fn tag_payload(scope: &WorkspaceScope, ticket_id: u64, payload: Value) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert(WORKSPACE_KEY.to_string(), Value::String(scope.as_str().to_string()));
    map.insert(TICKET_ID_KEY.to_string(), Value::from(ticket_id));
    Value::Object(map)
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), QaError> {
    if vector.len() != expected {
        return Err(QaError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn point_ids_are_deterministic_and_scoped() {
        let acme = WorkspaceScope::new("acme");
        let globex = WorkspaceScope::new("globex");
        assert_eq!(point_id(&acme, 7), point_id(&acme, 7));
        assert_ne!(point_id(&acme, 7), point_id(&globex, 7));
        assert_ne!(point_id(&acme, 7), point_id(&acme, 8));
    }

    #[test]
    fn tagging_overrides_caller_workspace() {
        let tagged = tag_payload(
            &WorkspaceScope::new("acme"),
            42,
            json!({"question": "Why?", "workspace": "spoofed"}),
        );
        assert_eq!(
            tagged,
            json!({"question": "Why?", "workspace": "acme", "ticket_id": 42})
        );
        assert_eq!(
            tag_payload(&WorkspaceScope::new("w"), 1, Value::Null),
            json!({"workspace": "w", "ticket_id": 1})
        );
    }

    #[test]
    fn memory_backend_is_selectable() {
        let config = IndexConfig {
            backend: IndexBackend::Memory,
            ..IndexConfig::default()
        };
        let index = build_index(&config, 3).unwrap();
        assert_eq!(index.name(), "memory");
        assert_eq!(index.dimension(), 3);
    }
}
