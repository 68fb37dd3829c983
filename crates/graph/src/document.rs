use crate::error::{GraphError, Result};
use crate::graph::DependencyGraph;
use crate::types::{EdgeRecord, NodeRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TOPOLOGY_SCHEMA_VERSION: u32 = 1;

/// Topology section of a corpus file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Deserialize)]
struct PersistedTopology {
    schema_version: u32,
    #[serde(default)]
    topology: TopologyDocument,
}

impl TopologyDocument {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let persisted: PersistedTopology = serde_json::from_slice(bytes)?;
        if persisted.schema_version != TOPOLOGY_SCHEMA_VERSION {
            return Err(GraphError::UnsupportedSchema {
                found: persisted.schema_version,
                expected: TOPOLOGY_SCHEMA_VERSION,
            });
        }
        Ok(persisted.topology)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let document = Self::from_json(&bytes)?;
        log::info!(
            "Loaded topology from {}: {} nodes, {} edges",
            path.display(),
            document.nodes.len(),
            document.edges.len()
        );
        Ok(document)
    }

    /// Build the graph; edges with an endpoint missing from `nodes` are skipped.
    #[must_use]
    pub fn to_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for node in &self.nodes {
            graph.upsert_node(node.clone());
        }
        for edge in &self.edges {
            if let Err(err) = graph.add_edge(edge.clone()) {
                log::warn!(
                    "skipping dangling edge {} -> {}: {err}",
                    edge.source,
                    edge.target
                );
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_edges_are_skipped() {
        let raw = serde_json::json!({
            "schema_version": 1,
            "records": [],
            "topology": {
                "nodes": [
                    {"name": "gateway", "node_type": "service"},
                    {"name": "service-b", "node_type": "service"}
                ],
                "edges": [
                    {"source": "gateway", "target": "service-b", "relation": "calls",
                     "weight": 1.0, "confidence": 0.9},
                    {"source": "service-b", "target": "ghost", "relation": "calls",
                     "weight": 1.0, "confidence": 0.9}
                ]
            }
        });
        let doc = TopologyDocument::from_json(raw.to_string().as_bytes()).unwrap();
        let graph = doc.to_graph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn missing_topology_section_is_empty() {
        let doc = TopologyDocument::from_json(br#"{"schema_version": 1}"#).unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.edges.is_empty());
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let err = TopologyDocument::from_json(br#"{"schema_version": 3}"#).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedSchema { found: 3, .. }));
    }
}
