use crate::completion::CompletionClient;
use crate::error::{Result, StageError};
use crate::rules::RuleSet;
use rootcause_evidence_store::{
    EvidenceCorpus, EvidenceRecord, HashingEmbedder, InMemoryLexicalIndex, InMemoryVectorIndex,
};
use rootcause_graph::{
    GraphStore, InMemoryGraphStore, TopologyConfig, TopologyDocument, TopologyResolver,
};
use rootcause_search::{HybridSearch, SearchConfig};
use std::path::Path;
use std::sync::Arc;

/// Tools shared by the stages of every task.
#[derive(Clone)]
pub struct AgentToolkit {
    pub rules: Arc<RuleSet>,
    pub resolver: Arc<TopologyResolver>,
    pub search: Arc<HybridSearch>,
    pub completion: Option<Arc<dyn CompletionClient>>,
}

impl AgentToolkit {
    #[must_use]
    pub fn new(
        rules: Arc<RuleSet>,
        resolver: Arc<TopologyResolver>,
        search: Arc<HybridSearch>,
    ) -> Self {
        Self {
            rules,
            resolver,
            search,
            completion: None,
        }
    }

    #[must_use]
    pub fn with_completion(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(client);
        self
    }

    /// In-memory vector, lexical and graph backends over the given records and topology.
    pub async fn in_memory(
        records: Vec<EvidenceRecord>,
        topology: &TopologyDocument,
        search_config: SearchConfig,
        topology_config: TopologyConfig,
        rules: Arc<RuleSet>,
    ) -> Result<Self> {
        let embedder = HashingEmbedder::default();
        let vector = InMemoryVectorIndex::from_records(embedder, records.iter().cloned())
            .map_err(|err| StageError::Setup(err.to_string()))?;
        let lexical = InMemoryLexicalIndex::from_records(records);
        let search = HybridSearch::new(Arc::new(vector), Arc::new(lexical), search_config)
            .map_err(|err| StageError::Setup(err.to_string()))?
            .with_embedder(embedder);

        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::from_document(topology));
        let resolver = TopologyResolver::build(store, topology_config)
            .await
            .map_err(|err| StageError::Setup(err.to_string()))?;

        Ok(Self::new(rules, Arc::new(resolver), Arc::new(search)))
    }

    /// Load a corpus file (evidence records plus topology) into in-memory backends.
    pub async fn from_corpus_file(
        path: impl AsRef<Path>,
        search_config: SearchConfig,
        topology_config: TopologyConfig,
        rules: Arc<RuleSet>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let corpus = EvidenceCorpus::load(path)
            .await
            .map_err(|err| StageError::Setup(format!("{}: {err}", path.display())))?;
        let topology = TopologyDocument::load(path)
            .await
            .map_err(|err| StageError::Setup(format!("{}: {err}", path.display())))?;
        Self::in_memory(
            corpus.into_records(),
            &topology,
            search_config,
            topology_config,
            rules,
        )
        .await
    }
}
