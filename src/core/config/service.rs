use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::paths::AppPaths;
use super::types::{AppConfig, EmbeddingBackend, IndexBackend, LlmBackend};
use super::validation::validate_config;
use crate::core::errors::QaError;

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("QA_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    /// Loads `config.yml`, applies environment overrides and validates the result.
    pub fn load_config(&self) -> Result<AppConfig, QaError> {
        let mut config = load_yaml_file(&self.config_path())?;
        apply_env_overrides(&mut config, |key| env::var(key).ok());
        if config.database.url.is_none() {
            config.database.url = Some(format!(
                "sqlite://{}",
                self.paths.db_path.to_string_lossy()
            ));
        }
        validate_config(&config)?;
        Ok(config)
    }
}

fn load_yaml_file(path: &Path) -> Result<AppConfig, QaError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| QaError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    if contents.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str::<AppConfig>(&contents)
        .map_err(|e| QaError::Config(format!("cannot parse {}: {}", path.display(), e)))
}

/// Applies the deployment environment variables on top of the file config.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("API_TOKEN") {
        config.auth.api_token = token;
    }
    if let Some(raw) = get("WORKSPACE_TOKENS") {
        for (workspace, token) in parse_workspace_tokens(&raw) {
            config.auth.workspace_tokens.insert(workspace, token);
        }
    }

    if let Some(raw) = get("LLM_PROVIDER") {
        match LlmBackend::parse(&raw) {
            Some(provider) => config.llm.provider = provider,
            None => tracing::warn!("Ignoring unknown LLM_PROVIDER '{}'", raw),
        }
    }
    if let Some(url) = get("OLLAMA_URL") {
        config.llm.ollama.url = url;
    }
    if let Some(model) = get("OLLAMA_MODEL") {
        config.llm.ollama.model = model;
    }
    if let Some(key) = get("OPENAI_API_KEY") {
        config.llm.openai.api_key = Some(key);
    }
    if let Some(model) = get("OPENAI_MODEL") {
        config.llm.openai.model = model;
    }
    if let Some(url) = get("OPENAI_BASE_URL") {
        config.llm.openai.base_url = url;
    }
    if let Some(proxy) = get("OPENAI_PROXY_URL") {
        config.llm.openai.proxy_url = Some(proxy);
    }

    if let Some(raw) = get("EMBEDDING_BACKEND") {
        match EmbeddingBackend::parse(&raw) {
            Some(backend) => config.embedding.backend = backend,
            None => tracing::warn!("Ignoring unknown EMBEDDING_BACKEND '{}'", raw),
        }
    }
    if let Some(model) = get("EMBEDDING_MODEL") {
        config.embedding.model = model;
    }

    if let Some(url) = get("DATABASE_URL") {
        config.database.url = Some(url);
    }

    if let Some(raw) = get("VECTOR_INDEX_BACKEND") {
        match IndexBackend::parse(&raw) {
            Some(backend) => config.index.backend = backend,
            None => tracing::warn!("Ignoring unknown VECTOR_INDEX_BACKEND '{}'", raw),
        }
    }
    if let Some(url) = get("QDRANT_URL") {
        config.index.url = url;
    }
    if let Some(key) = get("QDRANT_API_KEY") {
        config.index.api_key = Some(key);
    }
    if let Some(collection) = get("QDRANT_COLLECTION_NAME") {
        config.index.collection = collection;
    }

    if let Some(host) = get("HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
        config.server.port = port;
    }
}

/// Parses `ws1:token1,ws2:token2`. Entries without a colon are skipped.
pub fn parse_workspace_tokens(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (workspace, token) = pair.trim().split_once(':')?;
            let workspace = workspace.trim();
            let token = token.trim();
            if workspace.is_empty() || token.is_empty() {
                return None;
            }
            Some((workspace.to_string(), token.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn workspace_tokens_parse_and_skip_malformed_pairs() {
        let parsed = parse_workspace_tokens("acme:t1, globex : t2 ,broken,:empty,x:");
        assert_eq!(
            parsed,
            vec![
                ("acme".to_string(), "t1".to_string()),
                ("globex".to_string(), "t2".to_string()),
            ]
        );
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env_of(&[
                ("API_TOKEN", "secret"),
                ("WORKSPACE_TOKENS", "acme:t1"),
                ("LLM_PROVIDER", "OpenAI"),
                ("OPENAI_API_KEY", "sk-test"),
                ("QDRANT_COLLECTION_NAME", "tickets"),
                ("PORT", "9100"),
            ]),
        );

        assert_eq!(config.auth.api_token, "secret");
        assert_eq!(config.auth.workspace_tokens.get("acme").unwrap(), "t1");
        assert_eq!(config.llm.provider, LlmBackend::OpenAi);
        assert_eq!(config.llm.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.index.collection, "tickets");
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn unknown_provider_keeps_default() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, env_of(&[("LLM_PROVIDER", "mystery")]));
        assert_eq!(config.llm.provider, LlmBackend::Ollama);
    }

    #[test]
    fn yaml_sections_fall_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(
            &path,
            "auth:\n  api_token: abc\nquality:\n  overlap_bonus: 0.25\nindex:\n  backend: memory\n",
        )
        .unwrap();

        let config = load_yaml_file(&path).unwrap();
        assert_eq!(config.auth.api_token, "abc");
        assert_eq!(config.auth.default_workspace, "default");
        assert!((config.quality.overlap_bonus - 0.25).abs() < 1e-9);
        assert!((config.quality.question_mark_bonus - 0.3).abs() < 1e-9);
        assert_eq!(config.index.backend, IndexBackend::Memory);
        assert_eq!(config.embedding.dimension, 384);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(&path, "auth: [unclosed").unwrap();

        assert!(matches!(load_yaml_file(&path), Err(QaError::Config(_))));
    }
}
