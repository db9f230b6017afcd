//! Relational copy of every saved Q&A pair, keyed by workspace and ticket.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub use sqlite::SqliteQaStore;

use crate::core::errors::QaError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaRecord {
    pub workspace: String,
    pub ticket_id: u64,
    pub question: String,
    pub answer: String,
    /// The save request as received.
    pub source: Value,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait QaRecordStore: Send + Sync {
    /// Insert, or replace the texts of an existing `(workspace, ticket_id)` row.
    async fn save(&self, record: &QaRecord) -> Result<(), QaError>;

    async fn get(&self, workspace: &str, ticket_id: u64) -> Result<Option<QaRecord>, QaError>;

    /// Records for whichever of `ticket_ids` exist, in no particular order.
    async fn get_many(&self, workspace: &str, ticket_ids: &[u64]) -> Result<Vec<QaRecord>, QaError>;
}
