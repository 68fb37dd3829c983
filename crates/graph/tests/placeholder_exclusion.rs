use rootcause_graph::{
    EntityType, GraphStore, InMemoryGraphStore, TopologyConfig, TopologyDocument,
    TopologyResolver,
};
use std::sync::Arc;
use tempfile::tempdir;

fn corpus_json() -> serde_json::Value {
    serde_json::json!({
        "schema_version": 1,
        "records": [],
        "topology": {
            "nodes": [
                {"name": "gateway", "node_type": "service", "attributes": {"team": "edge"}},
                {"name": "service-b", "node_type": "service", "attributes": {"team": "core"}},
                {"name": "legacy-worker", "node_type": "placeholder"},
                {"name": "billing-service", "node_type": "service", "attributes": {"owner": null}},
                {"name": "orders-db", "node_type": "database", "attributes": {"engine": "postgres"}},
                {"name": "audit-db", "node_type": "database"}
            ],
            "edges": [
                {"source": "gateway", "target": "service-b", "relation": "calls",
                 "weight": 1.0, "confidence": 0.9},
                {"source": "service-b", "target": "legacy-worker", "relation": "calls",
                 "weight": 1.0, "confidence": 0.9},
                {"source": "service-b", "target": "billing-service", "relation": "calls",
                 "weight": 1.0, "confidence": 0.9},
                {"source": "service-b", "target": "orders-db", "relation": "reads_from",
                 "weight": 0.7, "confidence": 0.8},
                {"source": "service-b", "target": "audit-db", "relation": "writes_to",
                 "weight": null, "confidence": 0.8}
            ]
        }
    })
}

async fn resolver_from_file() -> TopologyResolver {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corpus.json");
    std::fs::write(&path, corpus_json().to_string()).unwrap();
    let doc = TopologyDocument::load(&path).await.unwrap();
    let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::from_document(&doc));
    TopologyResolver::build(store, TopologyConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn incident_text_yields_service_entity() {
    let resolver = resolver_from_file().await;
    let entities = resolver.extract("service-b CPU usage spiking, responses timing out");
    let service_b = entities
        .iter()
        .find(|e| e.name == "service-b")
        .expect("service-b extracted");
    assert_eq!(service_b.entity_type, EntityType::Service);
    assert!(entities
        .iter()
        .any(|e| e.name == "cpu" && e.entity_type == EntityType::Metric));
}

#[tokio::test]
async fn incomplete_nodes_and_edges_never_surface() {
    let resolver = resolver_from_file().await;
    let (_, snapshot) = resolver
        .resolve("service-b CPU usage spiking, responses timing out")
        .await
        .unwrap();

    let names: Vec<&str> = snapshot.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["service-b", "gateway", "orders-db"]);
    assert!(snapshot
        .edges
        .iter()
        .all(|e| e.target != "audit-db" && e.target != "legacy-worker"));
    assert_eq!(snapshot.edges.len(), 2);
}

#[tokio::test]
async fn placeholder_nodes_are_not_in_the_dictionary() {
    let resolver = resolver_from_file().await;
    let entities = resolver.extract("legacy-worker and billing-service restarted");
    // Pattern matching still recognises the names; the graph refuses to expand them.
    let (_, snapshot) = resolver
        .resolve("legacy-worker and billing-service restarted")
        .await
        .unwrap();
    assert!(!entities.is_empty());
    assert!(snapshot.is_empty());
}
