use crate::error::Result;
use crate::model::{ExecutionPlan, KnowledgeSummary};
use crate::state::{AnalysisState, KNOWLEDGE_KEY, PLAN_KEY};
use rootcause_evidence_store::MetadataFilter;
use rootcause_graph::TopologyResolver;
use rootcause_protocol::StageName;
use rootcause_search::HybridSearch;
use std::sync::Arc;

/// Entity resolution plus hybrid retrieval for the planned query.
pub struct Knowledge {
    resolver: Arc<TopologyResolver>,
    search: Arc<HybridSearch>,
}

impl Knowledge {
    #[must_use]
    pub fn new(resolver: Arc<TopologyResolver>, search: Arc<HybridSearch>) -> Self {
        Self { resolver, search }
    }

    pub async fn process(&self, state: &AnalysisState) -> Result<AnalysisState> {
        let plan: ExecutionPlan = state.context(StageName::Knowledge, PLAN_KEY)?;

        // Entities come only from the resolver; nothing else may add to them.
        let entities = self.resolver.extract(&state.input_text);
        let topology = self
            .resolver
            .expand(&entities, self.resolver.config().max_depth)
            .await?;

        let query = if plan.keywords.is_empty() {
            state.input_text.clone()
        } else {
            plan.keywords.join(" ")
        };
        let top_k = self.search.config().top_k;
        let outcome = self
            .search
            .search(&query, None, &MetadataFilter::default(), top_k)
            .await?;

        let degraded_branches: Vec<_> = outcome.degraded_branches().into_iter().cloned().collect();
        let summary = KnowledgeSummary {
            entities,
            topology,
            evidence: outcome.items,
            query_class: outcome.query_class,
            degraded_branches,
        };

        let mut next = state.clone();
        let mut message = format!(
            "{} entities, {} topology nodes, {} evidence items",
            summary.entities.len(),
            summary.topology.nodes.len(),
            summary.evidence.len()
        );
        if !summary.degraded_branches.is_empty() {
            let names: Vec<String> = summary
                .degraded_branches
                .iter()
                .map(|b| b.branch.to_string())
                .collect();
            message.push_str(&format!(" (degraded: {})", names.join(", ")));
        }
        next.append_message(StageName::Knowledge, message);
        next.publish(StageName::Knowledge, KNOWLEDGE_KEY, &summary)?;
        next.finish_step();
        Ok(next)
    }
}
