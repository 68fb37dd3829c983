use rootcause_agents::StageError;
use rootcause_protocol::{ErrorClass, TaskState};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {task_id}: transition {from} -> {to} is not allowed")]
    InvalidTransition {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },

    #[error("Task {0} is still active")]
    TaskActive(String),

    #[error("Lease on task {0} expired")]
    LeaseExpired(String),

    #[error("Task {task_id} not terminal after {waited_ms}ms")]
    WaitTimeout { task_id: String, waited_ms: u64 },

    #[error("Task-state store error: {0}")]
    Store(String),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Pipeline setup failed: {0}")]
    Pipeline(#[from] StageError),
}

impl OrchestratorError {
    /// Closest class of the shared error taxonomy.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput(_) => ErrorClass::InvalidInput,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::LeaseExpired(_) => ErrorClass::LeaseExpired,
            Self::Pipeline(err) => err.class(),
            _ => ErrorClass::StageLogicError,
        }
    }
}
