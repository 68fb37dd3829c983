use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::fusion::fuse;
use crate::query_classifier::QueryClassifier;
use crate::rerank::{dedup_by_content, filter_candidates, rank};
use crate::types::{Branch, BranchOutcome, BranchReport, SearchOutcome};
use rootcause_evidence_store::{
    HashingEmbedder, LexicalBackend, MetadataFilter, ScoredRecord, VectorBackend,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hybrid retrieval: concurrent vector + lexical queries, weighted fusion,
/// content dedup and provenance filtering.
pub struct HybridSearch {
    vector: Arc<dyn VectorBackend>,
    lexical: Arc<dyn LexicalBackend>,
    embedder: HashingEmbedder,
    config: SearchConfig,
}

impl HybridSearch {
    pub fn new(
        vector: Arc<dyn VectorBackend>,
        lexical: Arc<dyn LexicalBackend>,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            vector,
            lexical,
            embedder: HashingEmbedder::default(),
            config,
        })
    }

    /// Embedder used when the caller passes no query vector.
    #[must_use]
    pub fn with_embedder(mut self, embedder: HashingEmbedder) -> Self {
        self.embedder = embedder;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Ranked evidence for a query.
    ///
    /// One failed branch degrades to the other; both failing is
    /// [`SearchError::RetrievalUnavailable`]. A `k` of 0 uses the configured `top_k`.
    pub async fn search(
        &self,
        query_text: &str,
        query_vector: Option<&[f32]>,
        filter: &MetadataFilter,
        k: usize,
    ) -> Result<SearchOutcome> {
        if query_text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let k = if k == 0 { self.config.top_k } else { k };
        let limit = k.saturating_mul(self.config.candidate_multiplier);
        let query_class = QueryClassifier::classify(query_text);
        let alpha = self.config.alpha_for(query_class);
        let embedded;
        let query_vector = match query_vector {
            Some(v) => v,
            None => {
                embedded = self.embedder.embed(query_text);
                embedded.as_slice()
            }
        };

        log::debug!(
            "Hybrid search: query='{}', class={:?}, alpha={:.2}, k={}, pool={}",
            query_text,
            query_class,
            alpha,
            k,
            limit
        );

        let deadline = Duration::from_millis(self.config.branch_timeout_ms);
        let started = Instant::now();
        let (vector_res, lexical_res) = tokio::join!(
            run_branch(
                Branch::Vector,
                deadline,
                self.vector.nearest(query_vector, filter, limit)
            ),
            run_branch(
                Branch::Lexical,
                deadline,
                self.lexical.search(query_text, filter, limit)
            ),
        );

        let (vector_hits, vector_report) = settle(Branch::Vector, vector_res);
        let (lexical_hits, lexical_report) = settle(Branch::Lexical, lexical_res);

        if vector_hits.is_none() && lexical_hits.is_none() {
            return Err(SearchError::RetrievalUnavailable {
                vector: vector_report.reason().unwrap_or_default(),
                lexical: lexical_report.reason().unwrap_or_default(),
            });
        }
        for report in [&vector_report, &lexical_report] {
            if let Some(reason) = report.reason() {
                log::warn!(
                    "{} branch degraded, ranking from the other branch only: {}",
                    report.branch,
                    reason
                );
            }
        }

        let fused = fuse(vector_hits.as_deref(), lexical_hits.as_deref(), alpha);
        let items = rank(dedup_by_content(fused), k);

        log::debug!(
            "Hybrid search completed: {} items in {:?}",
            items.len(),
            started.elapsed()
        );

        Ok(SearchOutcome {
            items,
            query_class,
            alpha,
            branches: vec![vector_report, lexical_report],
        })
    }
}

async fn run_branch<F>(
    branch: Branch,
    deadline: Duration,
    query: F,
) -> std::result::Result<Vec<ScoredRecord>, BranchOutcome>
where
    F: Future<Output = rootcause_evidence_store::Result<Vec<ScoredRecord>>>,
{
    match tokio::time::timeout(deadline, query).await {
        Ok(Ok(hits)) => Ok(hits),
        Ok(Err(err)) => {
            log::debug!("{branch} branch failed: {err}");
            Err(BranchOutcome::Failed {
                reason: err.to_string(),
            })
        }
        Err(_) => Err(BranchOutcome::TimedOut {
            after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

fn settle(
    branch: Branch,
    result: std::result::Result<Vec<ScoredRecord>, BranchOutcome>,
) -> (Option<Vec<ScoredRecord>>, BranchReport) {
    match result {
        Ok(hits) => {
            let (kept, discarded) = filter_candidates(hits);
            if discarded > 0 {
                log::debug!("{branch} branch: discarded {discarded} candidates with incomplete provenance");
            }
            let report = BranchReport {
                branch,
                outcome: BranchOutcome::Ok {
                    candidates: kept.len(),
                    discarded,
                },
            };
            (Some(kept), report)
        }
        Err(outcome) => (None, BranchReport { branch, outcome }),
    }
}
