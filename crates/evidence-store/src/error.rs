use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvidenceStoreError>;

#[derive(Error, Debug)]
pub enum EvidenceStoreError {
    #[error("Backend timed out: {0}")]
    Timeout(String),

    #[error("Backend connection error: {0}")]
    Connection(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Unsupported corpus schema_version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl EvidenceStoreError {
    /// Timeouts and connection failures may succeed on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}
