use rootcause_evidence_store::{
    EvidenceCorpus, EvidenceRecord, EvidenceStoreError, SourceKind, EVIDENCE_CORPUS_SCHEMA_VERSION,
};
use tempfile::TempDir;

fn record(id: &str) -> EvidenceRecord {
    EvidenceRecord {
        id: id.to_string(),
        title: "CPU alert".to_string(),
        text: "service-b cpu above threshold".to_string(),
        source_kind: SourceKind::Ticket,
        timestamp_ms: Some(1_700_000_000_000),
        origin: Some("tickets/INC-1".to_string()),
        vector: None,
    }
}

#[tokio::test]
async fn corpus_saves_and_loads() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("nested").join("corpus.json");

    let corpus = EvidenceCorpus::new(vec![record("r1"), record("r2")]);
    corpus.save(&path).await.expect("save");

    let loaded = EvidenceCorpus::load(&path).await.expect("load");
    assert_eq!(loaded.records(), corpus.records());
}

#[tokio::test]
async fn corpus_ignores_unrelated_sections() {
    let raw = serde_json::json!({
        "schema_version": EVIDENCE_CORPUS_SCHEMA_VERSION,
        "records": [ {
            "id": "r1",
            "text": "disk full on host-3",
            "source_kind": "log",
            "timestamp_ms": 5,
            "origin": "logs/host-3.log"
        } ],
        "topology": { "nodes": [], "edges": [] }
    });
    let corpus = EvidenceCorpus::from_json(raw.to_string().as_bytes()).expect("parse");
    assert_eq!(corpus.records().len(), 1);
    assert_eq!(corpus.records()[0].title, "");
}

#[test]
fn corpus_rejects_unknown_schema_version() {
    let raw = br#"{"schema_version": 99, "records": []}"#;
    let err = EvidenceCorpus::from_json(raw).unwrap_err();
    assert!(matches!(
        err,
        EvidenceStoreError::UnsupportedSchema { found: 99, .. }
    ));
}
