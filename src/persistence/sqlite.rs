use std::path::Path;
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use super::{QaRecord, QaRecordStore};
use crate::core::errors::QaError;

pub struct SqliteQaStore {
    pool: SqlitePool,
}

impl SqliteQaStore {
    /// Opens a `sqlite://` URL, creating the file if needed.
    pub async fn connect(url: &str) -> Result<Self, QaError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| QaError::Config(format!("invalid database URL '{}': {}", url, e)))?;
        Self::open(options).await
    }

    pub async fn with_path(db_path: &Path) -> Result<Self, QaError> {
        Self::open(SqliteConnectOptions::new().filename(db_path)).await
    }

    async fn open(options: SqliteConnectOptions) -> Result<Self, QaError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(QaError::persistence)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), QaError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS qa (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace TEXT NOT NULL,
                ticket_id INTEGER NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                UNIQUE (workspace, ticket_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(QaError::persistence)?;

        Ok(())
    }

    fn row_to_record(row: &SqliteRow) -> Result<QaRecord, QaError> {
        let ticket_id: i64 = row.get("ticket_id");
        let source: String = row.get("source");
        let created_at: String = row.get("created_at");

        Ok(QaRecord {
            workspace: row.get("workspace"),
            ticket_id: u64::try_from(ticket_id).map_err(QaError::persistence)?,
            question: row.get("question"),
            answer: row.get("answer"),
            source: serde_json::from_str::<Value>(&source).unwrap_or(Value::Null),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| QaError::persistence(anyhow!("bad created_at '{}': {}", created_at, e)))?
                .with_timezone(&Utc),
        })
    }
}

fn db_ticket_id(ticket_id: u64) -> Result<i64, QaError> {
    i64::try_from(ticket_id)
        .map_err(|_| QaError::persistence(anyhow!("ticket id {} exceeds storage range", ticket_id)))
}

#[async_trait]
impl QaRecordStore for SqliteQaStore {
    async fn save(&self, record: &QaRecord) -> Result<(), QaError> {
        let source = serde_json::to_string(&record.source).map_err(QaError::persistence)?;

        sqlx::query(
            "INSERT INTO qa (workspace, ticket_id, question, answer, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (workspace, ticket_id) DO UPDATE SET
                question = excluded.question,
                answer = excluded.answer,
                source = excluded.source",
        )
        .bind(&record.workspace)
        .bind(db_ticket_id(record.ticket_id)?)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(&source)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(QaError::persistence)?;

        Ok(())
    }

    async fn get(&self, workspace: &str, ticket_id: u64) -> Result<Option<QaRecord>, QaError> {
        let row = sqlx::query(
            "SELECT workspace, ticket_id, question, answer, source, created_at
             FROM qa WHERE workspace = ?1 AND ticket_id = ?2",
        )
        .bind(workspace)
        .bind(db_ticket_id(ticket_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(QaError::persistence)?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn get_many(&self, workspace: &str, ticket_ids: &[u64]) -> Result<Vec<QaRecord>, QaError> {
        if ticket_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ticket_ids.len()].join(", ");
        let sql = format!(
            "SELECT workspace, ticket_id, question, answer, source, created_at
             FROM qa WHERE workspace = ? AND ticket_id IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(workspace);
        for ticket_id in ticket_ids {
            query = query.bind(db_ticket_id(*ticket_id)?);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(QaError::persistence)?;
        rows.iter().map(Self::row_to_record).collect()
    }
}
