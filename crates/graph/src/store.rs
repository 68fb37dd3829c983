use crate::document::TopologyDocument;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::types::{EdgeRecord, NodeRecord};
use async_trait::async_trait;

/// Narrow query interface over a dependency-graph store.
///
/// Traversal is driven by the caller one hop at a time so that incomplete
/// nodes can be excluded before they are crossed.
#[async_trait]
pub trait GraphStore: Send + Sync {
    fn name(&self) -> &str;

    /// All node records, used to seed the entity dictionary.
    async fn catalog(&self) -> Result<Vec<NodeRecord>>;

    async fn node(&self, name: &str) -> Result<Option<NodeRecord>>;

    /// Edges touching `name` in either direction.
    async fn edges(&self, name: &str) -> Result<Vec<EdgeRecord>>;
}

/// [`GraphStore`] backed by an in-memory [`DependencyGraph`].
pub struct InMemoryGraphStore {
    graph: DependencyGraph,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new(graph: DependencyGraph) -> Self {
        Self { graph }
    }

    #[must_use]
    pub fn from_document(document: &TopologyDocument) -> Self {
        Self::new(document.to_graph())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    fn name(&self) -> &str {
        "memory-graph"
    }

    async fn catalog(&self) -> Result<Vec<NodeRecord>> {
        Ok(self.graph.nodes().cloned().collect())
    }

    async fn node(&self, name: &str) -> Result<Option<NodeRecord>> {
        Ok(self
            .graph
            .find_node(name)
            .and_then(|idx| self.graph.get_node(idx))
            .cloned())
    }

    async fn edges(&self, name: &str) -> Result<Vec<EdgeRecord>> {
        Ok(self
            .graph
            .find_node(name)
            .map(|idx| self.graph.incident_edges(idx).into_iter().cloned().collect())
            .unwrap_or_default())
    }
}
