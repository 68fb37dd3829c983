use crate::query_classifier::QueryClass;
use rootcause_evidence_store::SourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Vector,
    Lexical,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector => f.write_str("vector"),
            Self::Lexical => f.write_str("lexical"),
        }
    }
}

/// Scored, deduplicated unit of retrieved support. Only built from records with
/// complete provenance, so `timestamp_ms` and `origin` are never placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub title: String,
    pub text: String,
    pub source_kind: SourceKind,
    /// Raw vector-branch score; `None` if the item did not come from that branch
    pub vector_score: Option<f32>,
    /// Raw lexical-branch score
    pub lexical_score: Option<f32>,
    pub fused_score: f32,
    pub timestamp_ms: u64,
    pub origin: String,
    /// SHA-256 of (title, normalised text)
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchOutcome {
    Ok {
        candidates: usize,
        /// Candidates dropped for incomplete provenance
        discarded: usize,
    },
    Failed {
        reason: String,
    },
    TimedOut {
        after_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchReport {
    pub branch: Branch,
    #[serde(flatten)]
    pub outcome: BranchOutcome,
}

impl BranchReport {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.outcome, BranchOutcome::Ok { .. })
    }

    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match &self.outcome {
            BranchOutcome::Ok { .. } => None,
            BranchOutcome::Failed { reason } => Some(reason.clone()),
            BranchOutcome::TimedOut { after_ms } => Some(format!("timed out after {after_ms}ms")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub items: Vec<EvidenceItem>,
    pub query_class: QueryClass,
    /// Configured vector weight before renormalisation
    pub alpha: f32,
    pub branches: Vec<BranchReport>,
}

impl SearchOutcome {
    /// Branches that failed or timed out.
    #[must_use]
    pub fn degraded_branches(&self) -> Vec<&BranchReport> {
        self.branches.iter().filter(|b| !b.succeeded()).collect()
    }
}
