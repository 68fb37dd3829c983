use crate::error::{GraphError, Result};
use crate::types::{EdgeRecord, NodeRecord};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// In-memory service dependency graph
pub struct DependencyGraph {
    /// Directed graph (dependent -> dependency)
    pub graph: DiGraph<NodeRecord, EdgeRecord>,

    /// Lowercased node name -> NodeIndex
    pub name_index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_index: HashMap::new(),
        }
    }

    /// Insert a node, replacing the record of an existing node with the same name
    pub fn upsert_node(&mut self, node: NodeRecord) -> NodeIndex {
        let key = node.name.to_lowercase();
        if let Some(&idx) = self.name_index.get(&key) {
            if let Some(slot) = self.graph.node_weight_mut(idx) {
                *slot = node;
            }
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.name_index.insert(key, idx);
        idx
    }

    /// Add an edge between two existing nodes
    pub fn add_edge(&mut self, edge: EdgeRecord) -> Result<()> {
        let from = self
            .find_node(&edge.source)
            .ok_or_else(|| GraphError::NodeNotFound(edge.source.clone()))?;
        let to = self
            .find_node(&edge.target)
            .ok_or_else(|| GraphError::NodeNotFound(edge.target.clone()))?;
        self.graph.add_edge(from, to, edge);
        Ok(())
    }

    pub fn find_node(&self, name: &str) -> Option<NodeIndex> {
        self.name_index.get(&name.to_lowercase()).copied()
    }

    pub fn get_node(&self, idx: NodeIndex) -> Option<&NodeRecord> {
        self.graph.node_weight(idx)
    }

    /// Edges touching a node in either direction
    pub fn incident_edges(&self, idx: NodeIndex) -> Vec<&EdgeRecord> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight())
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.graph
            .node_indices()
            .filter_map(move |idx| self.graph.node_weight(idx))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
