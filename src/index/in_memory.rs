use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::similarity::cosine_similarity;
use super::{check_dimension, tag_payload, RetrievalResult, VectorIndex, WorkspaceScope};
use crate::core::errors::QaError;

struct Entry {
    workspace: String,
    ticket_id: u64,
    vector: Vec<f32>,
    payload: Value,
}

/// Process-local index for tests and single-node runs. Overwrites keep the
/// original insertion slot, so ties stay in first-write order.
pub struct InMemoryIndex {
    dimension: usize,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(
        &self,
        scope: &WorkspaceScope,
        ticket_id: u64,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<(), QaError> {
        check_dimension(self.dimension, &vector)?;
        let entry = Entry {
            workspace: scope.as_str().to_string(),
            ticket_id,
            vector,
            payload: tag_payload(scope, ticket_id, payload),
        };

        let mut entries = self.entries.write().await;
        match entries
            .iter_mut()
            .find(|e| e.workspace == scope.as_str() && e.ticket_id == ticket_id)
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn search(
        &self,
        scope: &WorkspaceScope,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<RetrievalResult>, QaError> {
        check_dimension(self.dimension, vector)?;

        let entries = self.entries.read().await;
        let mut results: Vec<RetrievalResult> = entries
            .iter()
            .filter(|e| e.workspace == scope.as_str())
            .map(|e| RetrievalResult {
                ticket_id: e.ticket_id,
                score: cosine_similarity(vector, &e.vector),
                payload: e.payload.clone(),
            })
            .filter(|r| r.score >= score_threshold)
            .collect();

        // sort_by is stable: equal scores keep insertion order
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn remove(&self, scope: &WorkspaceScope, ticket_id: u64) -> Result<(), QaError> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| !(e.workspace == scope.as_str() && e.ticket_id == ticket_id));
        Ok(())
    }

    async fn count(&self, scope: &WorkspaceScope) -> Result<usize, QaError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.workspace == scope.as_str()).count())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scope(name: &str) -> WorkspaceScope {
        WorkspaceScope::new(name)
    }

    #[tokio::test]
    async fn workspaces_are_isolated() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(&scope("acme"), 1, vec![1.0, 0.0], json!({"question": "acme"}))
            .await
            .unwrap();
        index
            .upsert(&scope("globex"), 1, vec![1.0, 0.0], json!({"question": "globex"}))
            .await
            .unwrap();

        let results = index.search(&scope("acme"), &[1.0, 0.0], 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload["question"], "acme");
        assert_eq!(results[0].payload["workspace"], "acme");

        assert!(index
            .search(&scope("initech"), &[1.0, 0.0], 10, 0.0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn upsert_overwrites_same_ticket() {
        let index = InMemoryIndex::new(2);
        let ws = scope("acme");
        index.upsert(&ws, 9, vec![1.0, 0.0], json!({"v": 1})).await.unwrap();
        index.upsert(&ws, 9, vec![0.0, 1.0], json!({"v": 2})).await.unwrap();

        assert_eq!(index.count(&ws).await.unwrap(), 1);
        let results = index.search(&ws, &[0.0, 1.0], 10, 0.0).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload["v"], 2);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn threshold_drops_weak_matches_within_top_k() {
        let index = InMemoryIndex::new(2);
        let ws = scope("acme");
        index
            .upsert(&ws, 1, vec![0.5, 0.75f32.sqrt()], Value::Null)
            .await
            .unwrap();

        assert!(index.search(&ws, &[1.0, 0.0], 5, 0.9).await.unwrap().is_empty());
        assert_eq!(index.search(&ws, &[1.0, 0.0], 5, 0.4).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn results_are_ordered_with_stable_ties() {
        let index = InMemoryIndex::new(2);
        let ws = scope("acme");
        index.upsert(&ws, 10, vec![0.0, 1.0], Value::Null).await.unwrap();
        index.upsert(&ws, 20, vec![1.0, 0.0], Value::Null).await.unwrap();
        index.upsert(&ws, 30, vec![2.0, 0.0], Value::Null).await.unwrap();
        index.upsert(&ws, 40, vec![1.0, 1.0], Value::Null).await.unwrap();

        let ids: Vec<u64> = index
            .search(&ws, &[1.0, 0.0], 3, 0.0)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.ticket_id)
            .collect();
        assert_eq!(ids, vec![20, 30, 40]);
    }

    #[tokio::test]
    async fn wrong_vector_length_is_dimension_mismatch() {
        let index = InMemoryIndex::new(3);
        let err = index
            .upsert(&scope("acme"), 1, vec![1.0, 0.0], Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QaError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(index.search(&scope("acme"), &[1.0], 1, 0.0).await.is_err());
    }

    #[tokio::test]
    async fn remove_only_touches_its_workspace() {
        let index = InMemoryIndex::new(2);
        for ws in ["acme", "globex"] {
            index
                .upsert(&scope(ws), 1, vec![1.0, 0.0], Value::Null)
                .await
                .unwrap();
        }

        index.remove(&scope("acme"), 1).await.unwrap();
        index.remove(&scope("acme"), 99).await.unwrap();
        assert_eq!(index.count(&scope("acme")).await.unwrap(), 0);
        assert_eq!(index.count(&scope("globex")).await.unwrap(), 1);
    }
}
