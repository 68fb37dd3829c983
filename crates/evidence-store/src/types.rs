use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Log,
    Doc,
    Ticket,
    Code,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = match self {
            Self::Log => "log",
            Self::Doc => "doc",
            Self::Ticket => "ticket",
            Self::Code => "code",
        };
        f.write_str(raw)
    }
}

/// A raw record as stored by a backend, before any scoring or provenance checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
    pub source_kind: SourceKind,
    /// Unix milliseconds; `None` or `0` means unknown.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    /// File, URL or ticket locator the record came from.
    #[serde(default)]
    pub origin: Option<String>,
    /// Precomputed embedding. Computed at insert time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// A backend hit: the record plus the backend's native relevance score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: EvidenceRecord,
    pub score: f32,
}

/// Metadata filter applied inside the backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Allowed source kinds; empty allows every kind.
    #[serde(default)]
    pub source_kinds: Vec<SourceKind>,
    /// Lower bound on the record timestamp (inclusive).
    #[serde(default)]
    pub since_ms: Option<u64>,
}

impl MetadataFilter {
    #[must_use]
    pub fn matches(&self, record: &EvidenceRecord) -> bool {
        if !self.source_kinds.is_empty() && !self.source_kinds.contains(&record.source_kind) {
            return false;
        }
        match (self.since_ms, record.timestamp_ms) {
            (Some(since), Some(ts)) => ts >= since,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: SourceKind, ts: Option<u64>) -> EvidenceRecord {
        EvidenceRecord {
            id: "r".to_string(),
            title: String::new(),
            text: "cpu saturation".to_string(),
            source_kind: kind,
            timestamp_ms: ts,
            origin: Some("logs/app.log".to_string()),
            vector: None,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = MetadataFilter::default();
        assert!(filter.matches(&record(SourceKind::Log, None)));
        assert!(filter.matches(&record(SourceKind::Code, Some(5))));
    }

    #[test]
    fn filter_by_kind_and_time() {
        let filter = MetadataFilter {
            source_kinds: vec![SourceKind::Log, SourceKind::Ticket],
            since_ms: Some(100),
        };
        assert!(filter.matches(&record(SourceKind::Log, Some(100))));
        assert!(!filter.matches(&record(SourceKind::Log, Some(99))));
        assert!(!filter.matches(&record(SourceKind::Doc, Some(500))));
        assert!(!filter.matches(&record(SourceKind::Ticket, None)));
    }
}
