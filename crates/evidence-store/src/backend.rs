use crate::error::Result;
use crate::types::{MetadataFilter, ScoredRecord};
use async_trait::async_trait;

/// Nearest-neighbour query over embedded evidence.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` records most similar to `query`, best first.
    async fn nearest(
        &self,
        query: &[f32],
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>>;
}

/// Ranked keyword query over evidence text.
#[async_trait]
pub trait LexicalBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` records ranked by keyword relevance, best first.
    async fn search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>>;
}
