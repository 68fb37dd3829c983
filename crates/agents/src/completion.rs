use crate::error::StageError;
use async_trait::async_trait;
use rootcause_protocol::StageName;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    #[error("completion timed out")]
    Timeout,

    #[error("completion connection error: {0}")]
    Connection(String),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

/// Structured request; the prompt wording belongs to the client implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub stage: StageName,
    pub purpose: String,
    pub input: serde_json::Value,
    pub max_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
}

/// Language-completion service used for optional narrative text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Failures become stage errors instead of being ignored
    pub required: bool,
    pub timeout_ms: u64,
    pub max_chars: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            required: false,
            timeout_ms: 10_000,
            max_chars: 600,
        }
    }
}

/// Optional narrative for a stage result.
///
/// `Ok(None)` when no client is configured or an optional call failed.
pub(crate) async fn narrate(
    client: Option<&dyn CompletionClient>,
    config: &CompletionConfig,
    request: CompletionRequest,
) -> Result<Option<String>, StageError> {
    let Some(client) = client else {
        return Ok(None);
    };
    let stage = request.stage;
    let max_chars = request.max_chars;
    let deadline = Duration::from_millis(config.timeout_ms);

    let outcome = match tokio::time::timeout(deadline, client.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(CompletionError::Timeout),
    };

    match outcome {
        Ok(response) => {
            let text: String = response.text.trim().chars().take(max_chars).collect();
            Ok((!text.is_empty()).then_some(text))
        }
        Err(err) if config.required => Err(match err {
            CompletionError::Timeout => StageError::Timeout {
                stage,
                message: format!("{} completion: {err}", client.name()),
            },
            CompletionError::Connection(_) => StageError::Connection {
                stage,
                message: format!("{} completion: {err}", client.name()),
            },
            CompletionError::InvalidResponse(_) => {
                StageError::logic(stage, format!("{} completion: {err}", client.name()))
            }
        }),
        Err(err) => {
            log::warn!("{stage}: optional completion from {} skipped: {err}", client.name());
            Ok(None)
        }
    }
}
