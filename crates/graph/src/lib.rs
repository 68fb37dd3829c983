//! # Topology Graph
//!
//! Entity extraction and dependency-graph expansion for incident text.
//!
//! ## Architecture
//!
//! ```text
//! incident text
//!     │
//!     ├──> EntityExtractor (deterministic)
//!     │      ├─ service / database / host name patterns
//!     │      ├─ metric vocabulary
//!     │      └─ dictionary of known graph nodes
//!     │
//!     └──> TopologyResolver::expand
//!            ├─ BFS over GraphStore, one hop at a time
//!            ├─ skip nodes/edges with missing or placeholder fields
//!            └─ TopologySnapshot (nodes annotated with hop distance)
//! ```
//!
//! Snapshots are built per query and never persisted.

mod document;
mod error;
mod extract;
mod graph;
mod resolver;
mod store;
mod types;

pub use document::{TopologyDocument, TOPOLOGY_SCHEMA_VERSION};
pub use error::{GraphError, Result};
pub use extract::EntityExtractor;
pub use graph::DependencyGraph;
pub use resolver::{TopologyConfig, TopologyResolver};
pub use store::{GraphStore, InMemoryGraphStore};
pub use types::{
    EdgeRecord, Entity, EntityType, NodeRecord, Relationship, RelationshipType, TopologyNode,
    TopologySnapshot,
};
