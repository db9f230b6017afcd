use super::types::{AppConfig, LlmBackend, QualityConfig};
use crate::core::errors::QaError;

pub fn validate_config(config: &AppConfig) -> Result<(), QaError> {
    if config.auth.api_token.trim().is_empty() {
        return Err(config_error("API_TOKEN environment variable is required"));
    }
    if config.auth.default_workspace.trim().is_empty() {
        return Err(config_error("auth.default_workspace must not be empty"));
    }
    for (workspace, token) in &config.auth.workspace_tokens {
        if token.trim().is_empty() {
            return Err(config_error(&format!(
                "auth.workspace_tokens.{} must not be empty",
                workspace
            )));
        }
    }

    if config.llm.provider == LlmBackend::OpenAi
        && config
            .llm
            .openai
            .api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
    {
        return Err(config_error(
            "OPENAI_API_KEY environment variable is required when LLM_PROVIDER=openai",
        ));
    }
    validate_timeout("llm.request_timeout_secs", config.llm.request_timeout_secs)?;
    validate_timeout(
        "embedding.request_timeout_secs",
        config.embedding.request_timeout_secs,
    )?;
    validate_timeout("index.request_timeout_secs", config.index.request_timeout_secs)?;

    let extraction = &config.extraction;
    validate_range("extraction.temperature", extraction.temperature, 0.0, 2.0)?;
    validate_unit("extraction.fallback_confidence", extraction.fallback_confidence)?;
    validate_unit(
        "extraction.min_question_confidence",
        extraction.min_question_confidence,
    )?;
    validate_unit(
        "extraction.min_answer_relevance",
        extraction.min_answer_relevance,
    )?;
    validate_unit(
        "extraction.rule_based_confidence",
        extraction.rule_based_confidence,
    )?;
    if extraction.max_tokens == 0 {
        return Err(config_error("extraction.max_tokens must be positive"));
    }

    validate_quality(&config.quality)?;

    if config.embedding.dimension == 0 {
        return Err(config_error("embedding.dimension must be positive"));
    }
    if config.embedding.model.trim().is_empty() {
        return Err(config_error("embedding.model must not be empty"));
    }

    if config.index.collection.trim().is_empty() {
        return Err(config_error("index.collection must not be empty"));
    }
    if config.index.default_top_k == 0 || config.index.default_top_k > config.index.max_top_k {
        return Err(config_error(
            "index.default_top_k must be between 1 and index.max_top_k",
        ));
    }
    validate_unit("index.score_threshold", config.index.score_threshold as f64)?;

    validate_range("responder.temperature", config.responder.temperature, 0.0, 2.0)?;
    validate_unit("responder.top_p", config.responder.top_p)?;
    validate_unit("responder.min_relevance", config.responder.min_relevance as f64)?;
    if config.responder.max_evidence == 0 {
        return Err(config_error("responder.max_evidence must be positive"));
    }

    Ok(())
}

fn validate_quality(quality: &QualityConfig) -> Result<(), QaError> {
    let weights = [
        ("quality.question_mark_bonus", quality.question_mark_bonus),
        ("quality.interrogative_bonus", quality.interrogative_bonus),
        (
            "quality.missing_interrogative_penalty",
            quality.missing_interrogative_penalty,
        ),
        ("quality.answer_tokens_bonus", quality.answer_tokens_bonus),
        ("quality.action_phrase_bonus", quality.action_phrase_bonus),
        ("quality.overlap_bonus", quality.overlap_bonus),
        ("quality.answer_length_bonus", quality.answer_length_bonus),
    ];
    for (name, weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(config_error(&format!("{} must be non-negative", name)));
        }
    }
    validate_unit("quality.acceptance_threshold", quality.acceptance_threshold)
}

fn validate_unit(name: &str, value: f64) -> Result<(), QaError> {
    validate_range(name, value, 0.0, 1.0)
}

fn validate_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), QaError> {
    if !value.is_finite() || value < min || value > max {
        return Err(config_error(&format!(
            "{} must be between {} and {}",
            name, min, max
        )));
    }
    Ok(())
}

fn validate_timeout(name: &str, secs: u64) -> Result<(), QaError> {
    if secs == 0 {
        return Err(config_error(&format!("{} must be positive", name)));
    }
    Ok(())
}

fn config_error(message: &str) -> QaError {
    QaError::Config(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.api_token = "token".to_string();
        config
    }

    #[test]
    fn defaults_with_token_are_valid() {
        validate_config(&valid_config()).unwrap();
    }

    #[test]
    fn missing_api_token_is_rejected() {
        let err = validate_config(&AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("API_TOKEN"));
    }

    #[test]
    fn openai_requires_key() {
        let mut config = valid_config();
        config.llm.provider = LlmBackend::OpenAi;
        assert!(validate_config(&config).is_err());

        config.llm.openai.api_key = Some("sk".to_string());
        validate_config(&config).unwrap();
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let mut config = valid_config();
        config.quality.acceptance_threshold = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.index.score_threshold = -0.1;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.quality.overlap_bonus = -0.2;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_dimension_and_timeouts_are_rejected() {
        let mut config = valid_config();
        config.embedding.dimension = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.llm.request_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
