use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of named thing found in incident text or in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Service,
    Database,
    Host,
    Metric,
    ErrorCode,
}

impl EntityType {
    /// Parse a graph node type; placeholders and unknown types yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "service" | "svc" | "api" | "gateway" => Some(Self::Service),
            "database" | "db" | "cache" | "queue" => Some(Self::Database),
            "host" | "node" | "vm" => Some(Self::Host),
            "metric" => Some(Self::Metric),
            "error_code" | "errorcode" => Some(Self::ErrorCode),
            _ => None,
        }
    }

    /// Entity types that exist as nodes in the dependency graph.
    #[must_use]
    pub const fn is_topological(self) -> bool {
        matches!(self, Self::Service | Self::Database | Self::Host)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = match self {
            Self::Service => "SERVICE",
            Self::Database => "DATABASE",
            Self::Host => "HOST",
            Self::Metric => "METRIC",
            Self::ErrorCode => "ERROR_CODE",
        };
        f.write_str(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Source needs target to serve traffic
    DependsOn,

    /// Source issues requests to target
    Calls,

    /// Source runs on target
    HostedOn,

    ReadsFrom,

    WritesTo,
}

/// A validated edge of a topology snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub relation: RelationshipType,
    pub weight: f32,
    pub confidence: f32,
}

/// Node as held by a graph store. Fields may be missing or hold placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<String>>,
}

/// Edge as held by a graph store. Fields may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub relation: Option<RelationshipType>,
    #[serde(default)]
    pub weight: Option<f32>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

const PLACEHOLDER_VALUES: [&str; 6] = ["unknown", "null", "none", "n/a", "placeholder", "tbd"];

pub(crate) fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || PLACEHOLDER_VALUES
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

impl NodeRecord {
    /// Node type when the record is complete; `None` if any field is null or a placeholder.
    #[must_use]
    pub fn validated_type(&self) -> Option<EntityType> {
        if is_placeholder(&self.name) {
            return None;
        }
        let attrs_ok = self
            .attributes
            .values()
            .all(|v| v.as_deref().is_some_and(|v| !is_placeholder(v)));
        if !attrs_ok {
            return None;
        }
        self.node_type.as_deref().and_then(EntityType::parse)
    }
}

impl EdgeRecord {
    /// Validated relationship; `None` if any field is null or non-finite.
    #[must_use]
    pub fn validated(&self) -> Option<Relationship> {
        if is_placeholder(&self.source) || is_placeholder(&self.target) {
            return None;
        }
        let relation = self.relation?;
        let weight = self.weight.filter(|w| w.is_finite())?;
        let confidence = self.confidence.filter(|c| c.is_finite())?;
        Some(Relationship {
            source: self.source.clone(),
            target: self.target.clone(),
            relation,
            weight,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub name: String,
    pub entity_type: EntityType,
    /// Hops from the nearest seed entity.
    pub distance: usize,
    pub attributes: BTreeMap<String, String>,
}

/// Read-only, per-query view of the dependency subgraph around the extracted entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub seeds: Vec<String>,
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<Relationship>,
    pub max_depth: usize,
    /// Set when the node cap cut the traversal short.
    pub truncated: bool,
}

impl TopologySnapshot {
    #[must_use]
    pub fn distance_of(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(name))
            .map(|n| n.distance)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
