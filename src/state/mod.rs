use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::security::TokenRegistry;
use crate::embedding::build_embedder;
use crate::index::build_index;
use crate::llm::{build_provider, LlmProvider};
use crate::persistence::SqliteQaStore;
use crate::pipeline::QaService;

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// The provider, embedder, index and store are built once here and live for
/// the whole process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: TokenRegistry,
    pub provider: Arc<dyn LlmProvider>,
    pub qa: Arc<QaService>,
}

impl AppState {
    /// Builds every backend client named by `config`. The index is sized by
    /// the embedder so the two cannot disagree.
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>, InitializationError> {
        let provider = build_provider(&config.llm).map_err(InitializationError::Llm)?;
        let embedder =
            build_embedder(&config.embedding, &config.llm).map_err(InitializationError::Embedding)?;
        let index =
            build_index(&config.index, embedder.dimension()).map_err(InitializationError::Index)?;

        let db_url = config
            .database
            .url
            .as_deref()
            .ok_or(InitializationError::MissingDatabaseUrl)?;
        let store = Arc::new(
            SqliteQaStore::connect(db_url)
                .await
                .map_err(InitializationError::Store)?,
        );

        tracing::info!(
            "Backends ready: model {} ({}), index {}",
            provider.name(),
            provider.model(),
            index.name()
        );

        let qa = QaService::new(&config, provider.clone(), embedder, index, store);
        Ok(Self::from_parts(config, provider, qa))
    }

    pub fn from_parts(
        config: AppConfig,
        provider: Arc<dyn LlmProvider>,
        qa: QaService,
    ) -> Arc<Self> {
        Arc::new(AppState {
            registry: TokenRegistry::new(&config.auth),
            config: Arc::new(config),
            provider,
            qa: Arc::new(qa),
        })
    }
}
