use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::{
    check_dimension, point_id, tag_payload, RetrievalResult, VectorIndex, WorkspaceScope,
    TICKET_ID_KEY, WORKSPACE_KEY,
};
use crate::core::errors::QaError;

/// Qdrant collection accessed over the REST API.
///
/// The collection is checked (or created) on first use; a collection that
/// already exists with another vector size is refused.
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dimension: usize,
    ready: OnceCell<()>,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    score: f32,
    payload: Option<Value>,
}

impl QdrantIndex {
    pub fn new(
        url: &str,
        api_key: Option<&str>,
        collection: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, QaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QaError::Config(format!("cannot build Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            collection: collection.to_string(),
            dimension,
            ready: OnceCell::new(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn ensure_collection(&self) -> Result<(), QaError> {
        self.ready
            .get_or_try_init(|| self.open_or_create())
            .await
            .map(|_| ())
    }

    /// Opens the collection, creating it when missing. The payload index PUT
    /// is idempotent and runs on every path, so a failed earlier attempt is
    /// repaired on the next call.
    async fn open_or_create(&self) -> Result<(), QaError> {
        match self.fetch_collection().await? {
            Some(info) => self.verify_size(&info)?,
            None => {
                if !self.create_collection().await? {
                    // lost a create race: the winner's size still has to match
                    let info = self.fetch_collection().await?.ok_or_else(|| {
                        QaError::index(anyhow!(
                            "qdrant collection {} reported as existing but not found",
                            self.collection
                        ))
                    })?;
                    self.verify_size(&info)?;
                }
            }
        }
        self.ensure_payload_index().await
    }

    async fn fetch_collection(&self) -> Result<Option<Value>, QaError> {
        let url = self.collection_url();
        let res = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("qdrant collection lookup {}", url))
            .map_err(QaError::Index)?;

        match res.status() {
            StatusCode::OK => res
                .json()
                .await
                .context("qdrant collection info is not JSON")
                .map(Some)
                .map_err(QaError::Index),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let text = res.text().await.unwrap_or_default();
                Err(QaError::index(anyhow!(
                    "qdrant collection lookup failed ({}): {}",
                    status,
                    text
                )))
            }
        }
    }

    fn verify_size(&self, info: &Value) -> Result<(), QaError> {
        let vectors = &info["result"]["config"]["params"]["vectors"];
        let size = vectors["size"]
            .as_u64()
            .ok_or_else(|| QaError::index(anyhow!("qdrant collection has no vector size")))?;
        if size as usize != self.dimension {
            return Err(QaError::DimensionMismatch {
                expected: size as usize,
                actual: self.dimension,
            });
        }
        tracing::debug!("Using qdrant collection {} (dim {})", self.collection, size);
        Ok(())
    }

    /// Returns false when another process created the collection first.
    async fn create_collection(&self) -> Result<bool, QaError> {
        let url = self.collection_url();
        let body = json!({
            "vectors": {
                "size": self.dimension,
                "distance": "Cosine"
            }
        });
        let res = self
            .authorize(self.client.put(&url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("qdrant collection create {}", url))
            .map_err(QaError::Index)?;

        if res.status() == StatusCode::CONFLICT {
            tracing::info!("Qdrant collection {} was created concurrently", self.collection);
            return Ok(false);
        }
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::index(anyhow!(
                "qdrant collection error ({}): {}",
                status,
                text
            )));
        }

        tracing::info!(
            "Created qdrant collection {} (dim {}, cosine)",
            self.collection,
            self.dimension
        );
        Ok(true)
    }

    async fn ensure_payload_index(&self) -> Result<(), QaError> {
        let index_url = format!("{}/index", self.collection_url());
        let res = self
            .authorize(self.client.put(&index_url))
            .json(&json!({
                "field_name": WORKSPACE_KEY,
                "field_schema": "keyword"
            }))
            .send()
            .await
            .with_context(|| format!("qdrant payload index {}", index_url))
            .map_err(QaError::Index)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::index(anyhow!(
                "qdrant payload index failed ({}): {}",
                status,
                text
            )));
        }
        Ok(())
    }

    fn workspace_filter(scope: &WorkspaceScope) -> Value {
        json!({
            "must": [
                { "key": WORKSPACE_KEY, "match": { "value": scope.as_str() } }
            ]
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        "qdrant"
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
        self.ensure_collection().await?;

        let url = format!("{}/points", self.collection_url());
        let body = json!({
            "points": [{
                "id": point_id(scope, ticket_id).to_string(),
                "vector": vector,
                "payload": tag_payload(scope, ticket_id, payload),
            }]
        });
        let res = self
            .authorize(self.client.put(&url))
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await
            .with_context(|| format!("qdrant upsert {}", url))
            .map_err(QaError::Index)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::index(anyhow!(
                "qdrant upsert failed ({}): {}",
                status,
                text
            )));
        }
        tracing::debug!("Upserted ticket {} into workspace {}", ticket_id, scope);
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
        if top_k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_collection().await?;

        let url = format!("{}/points/search", self.collection_url());
        let body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
            "score_threshold": score_threshold,
            "filter": Self::workspace_filter(scope),
        });
        let res = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("qdrant search {}", url))
            .map_err(QaError::Index)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::index(anyhow!(
                "qdrant search failed ({}): {}",
                status,
                text
            )));
        }

        let body: SearchResponse = res
            .json()
            .await
            .context("qdrant search response")
            .map_err(QaError::Index)?;

        let mut results: Vec<RetrievalResult> = body
            .result
            .into_iter()
            .filter(|entry| entry.score >= score_threshold)
            .filter_map(|entry| {
                let payload = entry.payload?;
                // never trust a hit tagged with another workspace
                if payload[WORKSPACE_KEY].as_str() != Some(scope.as_str()) {
                    return None;
                }
                let ticket_id = payload[TICKET_ID_KEY].as_u64()?;
                Some(RetrievalResult {
                    ticket_id,
                    score: entry.score,
                    payload,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn remove(&self, scope: &WorkspaceScope, ticket_id: u64) -> Result<(), QaError> {
        self.ensure_collection().await?;

        let url = format!("{}/points/delete", self.collection_url());
        let res = self
            .authorize(self.client.post(&url))
            .query(&[("wait", "true")])
            .json(&json!({ "points": [point_id(scope, ticket_id).to_string()] }))
            .send()
            .await
            .with_context(|| format!("qdrant delete {}", url))
            .map_err(QaError::Index)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::index(anyhow!(
                "qdrant delete failed ({}): {}",
                status,
                text
            )));
        }
        tracing::debug!("Removed ticket {} from workspace {}", ticket_id, scope);
        Ok(())
    }

    async fn count(&self, scope: &WorkspaceScope) -> Result<usize, QaError> {
        self.ensure_collection().await?;

        let url = format!("{}/points/count", self.collection_url());
        let res = self
            .authorize(self.client.post(&url))
            .json(&json!({ "filter": Self::workspace_filter(scope), "exact": true }))
            .send()
            .await
            .with_context(|| format!("qdrant count {}", url))
            .map_err(QaError::Index)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(QaError::index(anyhow!(
                "qdrant count failed ({}): {}",
                status,
                text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .context("qdrant count response")
            .map_err(QaError::Index)?;
        payload["result"]["count"]
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| QaError::index(anyhow!("qdrant count response has no count")))
    }
}
