use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod status;

pub use status::{
    AgentRecord, AgentStatus, ErrorClass, FailureInfo, StageName, TaskSnapshot, TaskState,
};

/// Response to an accepted analysis submission (`202`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct AnalysisAccepted {
    pub task_id: String,
    pub polling_interval_ms: u64,
    pub supports_interruption: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn from_class(class: ErrorClass, message: impl Into<String>) -> Self {
        let hint = match class {
            ErrorClass::InvalidInput => {
                Some("Submit a non-empty incident description.".to_string())
            }
            ErrorClass::NotFound => Some(
                "The task id is unknown or its record has passed the retention window."
                    .to_string(),
            ),
            ErrorClass::RetrievalUnavailable => {
                Some("Both evidence backends failed; check vector and lexical stores.".to_string())
            }
            _ => None,
        };
        Self {
            code: class.code().to_string(),
            message: message.into(),
            details: None,
            hint,
        }
    }
}

/// JSON schema of the status snapshot returned by polling.
#[must_use]
pub fn status_schema() -> schemars::Schema {
    schemars::schema_for!(TaskSnapshot)
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
