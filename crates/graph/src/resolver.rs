use crate::error::{GraphError, Result};
use crate::extract::EntityExtractor;
use crate::store::GraphStore;
use crate::types::{Entity, Relationship, RelationshipType, TopologyNode, TopologySnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Hops from the seed entities
    pub max_depth: usize,

    /// Hard cap on snapshot size
    pub max_nodes: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_nodes: 64,
        }
    }
}

impl TopologyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 {
            return Err(GraphError::Other(
                "topology.max_nodes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Entity extraction plus bounded expansion over a [`GraphStore`].
pub struct TopologyResolver {
    store: Arc<dyn GraphStore>,
    extractor: EntityExtractor,
    config: TopologyConfig,
}

impl TopologyResolver {
    /// Build a resolver whose dictionary holds every complete node of the store catalog.
    pub async fn build(store: Arc<dyn GraphStore>, config: TopologyConfig) -> Result<Self> {
        config.validate()?;
        let catalog = store.catalog().await?;
        let entries = catalog
            .iter()
            .filter_map(|node| node.validated_type().map(|ty| (node.name.clone(), ty)))
            .collect::<Vec<_>>();
        let skipped = catalog.len() - entries.len();
        if skipped > 0 {
            log::debug!(
                "{} of {} catalog nodes from {} are incomplete and left out of the dictionary",
                skipped,
                catalog.len(),
                store.name()
            );
        }
        let extractor = EntityExtractor::new()?.with_dictionary(entries)?;
        Ok(Self {
            store,
            extractor,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<Entity> {
        self.extractor.extract(text)
    }

    /// Breadth-first expansion from the topological entities, at most `max_depth` hops.
    ///
    /// Nodes or edges with missing or placeholder fields are never crossed and never
    /// appear in the snapshot.
    pub async fn expand(&self, entities: &[Entity], max_depth: usize) -> Result<TopologySnapshot> {
        let mut included: HashMap<String, TopologyNode> = HashMap::new();
        let mut excluded: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        let mut relationships: BTreeMap<(String, String, RelationshipType), Relationship> = BTreeMap::new();
        let mut truncated = false;

        for entity in entities.iter().filter(|e| e.entity_type.is_topological()) {
            let key = entity.name.to_lowercase();
            if included.contains_key(&key) || excluded.contains(&key) {
                continue;
            }
            match self.admit(&entity.name, 0).await? {
                Some(node) if included.len() < self.config.max_nodes => {
                    queue.push_back((node.name.clone(), 0));
                    included.insert(key, node);
                }
                Some(_) => truncated = true,
                None => {
                    excluded.insert(key);
                }
            }
        }

        let mut seeds: Vec<String> = included.values().map(|n| n.name.clone()).collect();
        seeds.sort();

        while let Some((name, distance)) = queue.pop_front() {
            if distance >= max_depth {
                continue;
            }
            for edge in self.store.edges(&name).await? {
                let Some(rel) = edge.validated() else {
                    log::debug!(
                        "skipping incomplete edge {} -> {}",
                        edge.source,
                        edge.target
                    );
                    continue;
                };
                let neighbour = if rel.source.eq_ignore_ascii_case(&name) {
                    rel.target.clone()
                } else {
                    rel.source.clone()
                };
                let key = neighbour.to_lowercase();

                if !included.contains_key(&key) && !excluded.contains(&key) {
                    match self.admit(&neighbour, distance + 1).await? {
                        Some(_) if included.len() >= self.config.max_nodes => {
                            truncated = true;
                            continue;
                        }
                        Some(node) => {
                            queue.push_back((node.name.clone(), distance + 1));
                            included.insert(key.clone(), node);
                        }
                        None => {
                            excluded.insert(key);
                            continue;
                        }
                    }
                }

                if included.contains_key(&key) {
                    relationships.insert(
                        (
                            rel.source.to_lowercase(),
                            rel.target.to_lowercase(),
                            rel.relation,
                        ),
                        rel,
                    );
                }
            }
        }

        let mut nodes: Vec<TopologyNode> = included.into_values().collect();
        nodes.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.name.cmp(&b.name)));

        if truncated {
            log::warn!(
                "topology expansion truncated at {} nodes",
                self.config.max_nodes
            );
        }

        Ok(TopologySnapshot {
            seeds,
            nodes,
            edges: relationships.into_values().collect(),
            max_depth,
            truncated,
        })
    }

    /// `extract` followed by `expand` with the configured depth.
    pub async fn resolve(&self, text: &str) -> Result<(Vec<Entity>, TopologySnapshot)> {
        let entities = self.extract(text);
        let snapshot = self.expand(&entities, self.config.max_depth).await?;
        Ok((entities, snapshot))
    }

    async fn admit(&self, name: &str, distance: usize) -> Result<Option<TopologyNode>> {
        let Some(record) = self.store.node(name).await? else {
            return Ok(None);
        };
        let Some(entity_type) = record.validated_type() else {
            log::debug!("excluding incomplete node {}", record.name);
            return Ok(None);
        };
        let attributes = record
            .attributes
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        Ok(Some(TopologyNode {
            name: record.name,
            entity_type,
            distance,
            attributes,
        }))
    }
}
