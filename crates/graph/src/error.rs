use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph store error: {0}")]
    StoreError(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid entity pattern: {0}")]
    InvalidPattern(String),

    #[error("Unsupported topology schema_version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
