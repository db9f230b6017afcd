use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use qa_support_retriever::core::config::{AppPaths, ConfigService};
use qa_support_retriever::core::logging;
use qa_support_retriever::server;
use qa_support_retriever::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config_service = ConfigService::new(paths.clone());
    let config = config_service
        .load_config()
        .with_context(|| format!("Failed to load {}", config_service.config_path().display()))?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::initialize(config)
        .await
        .context("Failed to initialize application state")?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
