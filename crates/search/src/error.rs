use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    /// Both retrieval branches failed; a single failure degrades instead.
    #[error("Retrieval unavailable (vector: {vector}; lexical: {lexical})")]
    RetrievalUnavailable { vector: String, lexical: String },

    #[error("Empty query")]
    EmptyQuery,

    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
