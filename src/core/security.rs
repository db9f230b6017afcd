use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

use crate::core::config::AuthConfig;
use crate::core::errors::ApiError;
use crate::index::WorkspaceScope;

/// Maps bearer tokens to the workspace they act in.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    master_token: String,
    default_workspace: String,
    workspace_tokens: Vec<(String, String)>,
}

impl TokenRegistry {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            master_token: config.api_token.clone(),
            default_workspace: config.default_workspace.clone(),
            workspace_tokens: config
                .workspace_tokens
                .iter()
                .map(|(workspace, token)| (workspace.clone(), token.clone()))
                .collect(),
        }
    }

    /// Resolves a presented token. Every entry is compared so timing does not
    /// reveal which workspace matched.
    pub fn resolve(&self, presented: &str) -> Option<WorkspaceScope> {
        let mut resolved = None;

        if tokens_equal(presented, &self.master_token) {
            resolved = Some(self.default_workspace.as_str());
        }
        for (workspace, token) in &self.workspace_tokens {
            if tokens_equal(presented, token) && resolved.is_none() {
                resolved = Some(workspace.as_str());
            }
        }

        resolved.map(WorkspaceScope::new)
    }
}

pub fn require_workspace(
    headers: &HeaderMap,
    registry: &TokenRegistry,
) -> Result<WorkspaceScope, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    registry.resolve(token).ok_or(ApiError::Unauthorized)
}

fn tokens_equal(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
