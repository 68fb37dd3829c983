use rootcause_graph::{Entity, TopologySnapshot};
use rootcause_search::{BranchReport, EvidenceItem, QueryClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of an [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub expected_tools: Vec<String>,
    pub success_criteria: String,
}

/// Planner output. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Derived from the input text and rule-table version
    pub plan_id: String,
    pub problem_type: String,
    pub priority: String,
    pub complexity: String,
    pub keywords: Vec<String>,
    pub steps: Vec<PlanStep>,
    pub rule_version: String,
}

/// Knowledge output: ranked evidence plus the topology around the extracted entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSummary {
    pub entities: Vec<Entity>,
    pub topology: TopologySnapshot,
    pub evidence: Vec<EvidenceItem>,
    pub query_class: QueryClass,
    /// Retrieval branches that failed or timed out
    pub degraded_branches: Vec<BranchReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub name: String,
    pub category: String,
    pub matched_keywords: Vec<String>,
    /// Found in the incident text itself rather than only in evidence
    pub from_query: bool,
}

/// Candidate root cause with its support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Rule-table cause id
    pub cause_id: String,
    pub category: String,
    pub candidate_cause: String,
    pub symptom_set: Vec<String>,
    pub confidence: f32,
    pub supporting_evidence_ids: Vec<String>,
    pub mean_fused_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Risk on the `[0, 1]` scale used by the composite score.
    #[must_use]
    pub const fn score(self) -> f32 {
        match self {
            Self::Low => 0.2,
            Self::Medium => 0.5,
            Self::High => 0.8,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub category: String,
    pub hypothesis_id: String,
    pub risk_level: RiskLevel,
    pub estimated_effort: String,
    pub feasibility: f32,
    pub impact: f32,
    pub composite_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Final result of a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub plan: ExecutionPlan,
    pub entities: Vec<Entity>,
    pub evidence_count: usize,
    pub hypotheses: Vec<Hypothesis>,
    pub recommendations: Vec<Recommendation>,
}
