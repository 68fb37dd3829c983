use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rootcause_agents::{
    AgentToolkit, CompletionClient, CompletionConfig, CompletionError, CompletionRequest,
    CompletionResponse, Control, NoopObserver, Pipeline, PipelineConfig, PipelineOutcome,
    RetryPolicy, RuleSet, StageError, StageObserver,
};
use rootcause_evidence_store::{
    EvidenceRecord, EvidenceStoreError, InMemoryLexicalIndex, LexicalBackend, MetadataFilter,
    ScoredRecord, SourceKind, VectorBackend,
};
use rootcause_graph::{
    EntityType, GraphStore, InMemoryGraphStore, TopologyConfig, TopologyDocument,
    TopologyResolver,
};
use rootcause_protocol::{ErrorClass, StageName};
use rootcause_search::{HybridSearch, SearchConfig};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CPU_INCIDENT: &str = "service-b CPU usage spiking, responses timing out";

fn record(id: &str, title: &str, text: &str, kind: SourceKind) -> EvidenceRecord {
    EvidenceRecord {
        id: id.to_string(),
        title: title.to_string(),
        text: text.to_string(),
        source_kind: kind,
        timestamp_ms: Some(1_717_000_000_000),
        origin: Some(format!("s3://evidence/{id}")),
        vector: None,
    }
}

fn records() -> Vec<EvidenceRecord> {
    vec![
        record(
            "log-1",
            "service-b cpu alert",
            "service-b pods at 98% cpu, request latency p99 over 4s",
            SourceKind::Log,
        ),
        record(
            "ticket-7",
            "INC-7 service-b slow",
            "cpu throttling on service-b caused responses timing out for checkout",
            SourceKind::Ticket,
        ),
        record(
            "doc-3",
            "runbook: scaling service-b",
            "when cpu usage is spiking scale out service-b and raise cpu limits",
            SourceKind::Doc,
        ),
        record(
            "log-9",
            "orders-db replication",
            "replication lag on orders-db stayed below 1s",
            SourceKind::Log,
        ),
    ]
}

fn topology() -> TopologyDocument {
    let raw = serde_json::json!({
        "schema_version": 1,
        "topology": {
            "nodes": [
                {"name": "gateway", "node_type": "service"},
                {"name": "service-b", "node_type": "service"},
                {"name": "orders-db", "node_type": "database"}
            ],
            "edges": [
                {"source": "gateway", "target": "service-b", "relation": "calls",
                 "weight": 1.0, "confidence": 0.9},
                {"source": "service-b", "target": "orders-db", "relation": "reads_from",
                 "weight": 0.8, "confidence": 0.9}
            ]
        }
    });
    TopologyDocument::from_json(raw.to_string().as_bytes()).unwrap()
}

async fn in_memory_toolkit() -> AgentToolkit {
    AgentToolkit::in_memory(
        records(),
        &topology(),
        SearchConfig::default(),
        TopologyConfig::default(),
        Arc::new(RuleSet::builtin().unwrap()),
    )
    .await
    .unwrap()
}

/// Vector branch is always down; lexical branch fails its first `fail_first` calls.
struct Flaky {
    calls: AtomicUsize,
    fail_first: usize,
    index: InMemoryLexicalIndex,
}

impl Flaky {
    fn new(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_first,
            index: InMemoryLexicalIndex::from_records(records()),
        })
    }

    fn check(&self) -> rootcause_evidence_store::Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_first {
            return Err(EvidenceStoreError::Connection("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for Flaky {
    fn name(&self) -> &str {
        "flaky-vector"
    }

    async fn nearest(
        &self,
        _query: &[f32],
        _filter: &MetadataFilter,
        _limit: usize,
    ) -> rootcause_evidence_store::Result<Vec<ScoredRecord>> {
        Err(EvidenceStoreError::Connection("vector store offline".to_string()))
    }
}

#[async_trait]
impl LexicalBackend for Flaky {
    fn name(&self) -> &str {
        "flaky-lexical"
    }

    async fn search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> rootcause_evidence_store::Result<Vec<ScoredRecord>> {
        self.check()?;
        self.index.search(query, filter, limit).await
    }
}

async fn flaky_toolkit(fail_first: usize) -> AgentToolkit {
    let backend = Flaky::new(fail_first);
    let search =
        HybridSearch::new(backend.clone(), backend, SearchConfig::default()).unwrap();
    let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::from_document(&topology()));
    let resolver = TopologyResolver::build(store, TopologyConfig::default())
        .await
        .unwrap();
    AgentToolkit::new(
        Arc::new(RuleSet::builtin().unwrap()),
        Arc::new(resolver),
        Arc::new(search),
    )
}

/// Records every event; interrupts once `interrupt_after` has completed.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    interrupt_after: Option<StageName>,
}

impl Recorder {
    fn interrupting_after(stage: StageName) -> Self {
        Self {
            interrupt_after: Some(stage),
            ..Self::default()
        }
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageObserver for Recorder {
    async fn poll_interrupt(&self) -> Control {
        let Some(target) = self.interrupt_after else {
            return Control::Continue;
        };
        let finished = self
            .events()
            .iter()
            .rev()
            .find(|e| e.starts_with("started:"))
            .is_some_and(|e| e.starts_with(&format!("started:{target}")));
        if finished {
            Control::Interrupt {
                reason: "operator request".to_string(),
            }
        } else {
            Control::Continue
        }
    }

    async fn stage_started(&self, stage: StageName, attempt: u32) {
        self.push(format!("started:{stage}:{attempt}"));
    }

    async fn stage_waiting(&self, stage: StageName, attempt: u32, _: Duration, _: &StageError) {
        self.push(format!("waiting:{stage}:{attempt}"));
    }

    async fn stage_completed(&self, stage: StageName, _summary: &str, output: Option<&Value>) {
        assert!(output.is_some(), "{stage} published no output");
        self.push(format!("completed:{stage}"));
    }

    async fn stage_discarded(&self, stage: StageName) {
        self.push(format!("discarded:{stage}"));
    }

    async fn stage_failed(&self, stage: StageName, error: &StageError) {
        self.push(format!("failed:{stage}:{}", error.class().code()));
    }
}

#[tokio::test]
async fn cpu_incident_runs_all_four_stages() {
    let pipeline = Pipeline::new(in_memory_toolkit().await, PipelineConfig::default()).unwrap();
    let recorder = Recorder::default();

    let outcome = pipeline.run("task-a", CPU_INCIDENT, &recorder).await;
    let PipelineOutcome::Completed { state, report } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };

    assert_eq!(report.plan.problem_type, "troubleshooting");
    assert!(report
        .entities
        .iter()
        .any(|e| e.name == "service-b" && e.entity_type == EntityType::Service));
    assert!(report.evidence_count > 0);
    assert!(report.hypotheses.iter().any(|h| h.category == "resource"));
    assert!(!report.recommendations.is_empty());
    for rec in &report.recommendations {
        assert!((0.0..=1.0).contains(&rec.composite_score));
    }

    assert_eq!(
        recorder.events(),
        vec![
            "started:planner:1",
            "completed:planner",
            "started:knowledge:1",
            "completed:knowledge",
            "started:reasoning:1",
            "completed:reasoning",
            "started:executor:1",
            "completed:executor",
        ]
    );
    assert_eq!(state.step_index, 4);
    assert_eq!(state.messages().len(), 4);
}

#[tokio::test]
async fn hypotheses_are_capped_in_the_report() {
    let config = PipelineConfig {
        top_hypotheses: 1,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(in_memory_toolkit().await, config).unwrap();
    let outcome = pipeline.run("task-cap", CPU_INCIDENT, &NoopObserver).await;
    let PipelineOutcome::Completed { report, .. } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(report.hypotheses.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_retrieval_failure_is_retried() {
    let pipeline = Pipeline::new(flaky_toolkit(1).await, PipelineConfig::default()).unwrap();
    let recorder = Recorder::default();

    let outcome = pipeline.run("task-retry", CPU_INCIDENT, &recorder).await;
    assert!(matches!(outcome, PipelineOutcome::Completed { .. }), "{outcome:?}");

    let events = recorder.events();
    let knowledge: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .filter(|e| e.contains("knowledge"))
        .collect();
    assert_eq!(
        knowledge,
        vec![
            "started:knowledge:1",
            "waiting:knowledge:1",
            "started:knowledge:2",
            "completed:knowledge",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn retries_stop_at_the_attempt_bound() {
    let pipeline = Pipeline::new(flaky_toolkit(usize::MAX).await, PipelineConfig::default())
        .unwrap();
    let recorder = Recorder::default();

    let outcome = pipeline.run("task-exhausted", CPU_INCIDENT, &recorder).await;
    let PipelineOutcome::Failed { state, error } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.class(), ErrorClass::RetrievalUnavailable);
    assert_eq!(error.stage(), Some(StageName::Knowledge));
    assert_eq!(
        state.error.as_ref().and_then(|f| f.stage),
        Some(StageName::Knowledge)
    );
    // Planner output survives the later failure.
    assert!(state.shared_context.contains_key("plan"));

    let starts = recorder
        .events()
        .iter()
        .filter(|e| e.starts_with("started:knowledge"))
        .count();
    assert_eq!(starts, 3);
    assert!(recorder
        .events()
        .iter()
        .all(|e| !e.contains("reasoning") && !e.contains("executor")));
}

#[tokio::test(start_paused = true)]
async fn step_budget_bounds_total_attempts() {
    let config = PipelineConfig {
        max_steps: 4,
        retry: RetryPolicy {
            max_attempts: 10,
            ..RetryPolicy::default()
        },
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(flaky_toolkit(usize::MAX).await, config).unwrap();

    let outcome = pipeline.run("task-budget", CPU_INCIDENT, &NoopObserver).await;
    let PipelineOutcome::Failed { error, .. } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(matches!(
        error,
        StageError::StepBudgetExceeded {
            stage: StageName::Knowledge,
            steps: 4,
            max_steps: 4
        }
    ));
    assert_eq!(error.class(), ErrorClass::StepBudgetExceeded);
}

struct Stalling;

#[async_trait]
impl CompletionClient for Stalling {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(CompletionResponse {
            text: "too late".to_string(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_stage_times_out() {
    let toolkit = in_memory_toolkit().await.with_completion(Arc::new(Stalling));
    let config = PipelineConfig {
        stage_timeout_ms: 1_000,
        retry: RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
        completion: CompletionConfig {
            required: true,
            ..CompletionConfig::default()
        },
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(toolkit, config).unwrap();
    let recorder = Recorder::default();

    let outcome = pipeline.run("task-stall", CPU_INCIDENT, &recorder).await;
    let PipelineOutcome::Failed { error, .. } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.class(), ErrorClass::StageTimeout);
    assert_eq!(error.stage(), Some(StageName::Reasoning));
    assert_eq!(
        recorder.events().last().map(String::as_str),
        Some("failed:reasoning:stage_timeout")
    );
}

#[tokio::test]
async fn interrupt_discards_the_finished_stage() {
    let pipeline = Pipeline::new(in_memory_toolkit().await, PipelineConfig::default()).unwrap();
    let recorder = Recorder::interrupting_after(StageName::Knowledge);

    let outcome = pipeline.run("task-interrupt", CPU_INCIDENT, &recorder).await;
    let PipelineOutcome::Interrupted {
        state,
        reason,
        discarded,
    } = outcome
    else {
        panic!("expected interruption, got {outcome:?}");
    };
    assert_eq!(reason, "operator request");
    assert_eq!(discarded, Some(StageName::Knowledge));
    assert!(!state.shared_context.contains_key("knowledge"));
    assert_eq!(
        recorder.events(),
        vec![
            "started:planner:1",
            "completed:planner",
            "started:knowledge:1",
            "discarded:knowledge",
        ]
    );
}
