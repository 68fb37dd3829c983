use crate::types::EvidenceItem;
use rootcause_evidence_store::{normalize_text, EvidenceRecord, ScoredRecord};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;

const SENTINEL_ORIGINS: [&str; 5] = ["unknown", "null", "none", "n/a", "-"];

/// A record may be scored only when its origin and timestamp are real values.
#[must_use]
pub fn has_complete_provenance(record: &EvidenceRecord) -> bool {
    let origin_ok = record.origin.as_deref().is_some_and(|origin| {
        let trimmed = origin.trim();
        !trimmed.is_empty() && !SENTINEL_ORIGINS.iter().any(|s| trimmed.eq_ignore_ascii_case(s))
    });
    let timestamp_ok = record.timestamp_ms.is_some_and(|ts| ts > 0);
    origin_ok && timestamp_ok
}

/// Drop candidates with incomplete provenance or a non-finite score.
///
/// Returns the survivors and the number discarded.
pub(crate) fn filter_candidates(candidates: Vec<ScoredRecord>) -> (Vec<ScoredRecord>, usize) {
    let total = candidates.len();
    let kept: Vec<ScoredRecord> = candidates
        .into_iter()
        .filter(|c| c.score.is_finite() && has_complete_provenance(&c.record))
        .collect();
    let discarded = total - kept.len();
    (kept, discarded)
}

#[must_use]
pub fn content_hash(title: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(title).as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_text(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Keep one item per content hash: the higher fused score wins.
pub(crate) fn dedup_by_content(items: Vec<EvidenceItem>) -> Vec<EvidenceItem> {
    let mut best: HashMap<String, EvidenceItem> = HashMap::new();
    for item in items {
        let replace = best
            .get(&item.content_hash)
            .map_or(true, |current| rank_order(current, &item) == Ordering::Greater);
        if replace {
            best.insert(item.content_hash.clone(), item);
        }
    }
    best.into_values().collect()
}

/// Fused score descending, then recency descending, then id.
pub(crate) fn rank_order(a: &EvidenceItem, b: &EvidenceItem) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| b.timestamp_ms.cmp(&a.timestamp_ms))
        .then_with(|| a.id.cmp(&b.id))
}

pub(crate) fn rank(mut items: Vec<EvidenceItem>, k: usize) -> Vec<EvidenceItem> {
    items.sort_by(rank_order);
    items.truncate(k);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcause_evidence_store::SourceKind;

    fn record(origin: Option<&str>, ts: Option<u64>) -> EvidenceRecord {
        EvidenceRecord {
            id: "r1".to_string(),
            title: "t".to_string(),
            text: "body".to_string(),
            source_kind: SourceKind::Log,
            timestamp_ms: ts,
            origin: origin.map(str::to_string),
            vector: None,
        }
    }

    #[test]
    fn sentinel_provenance_is_incomplete() {
        assert!(has_complete_provenance(&record(Some("logs/app.log"), Some(5))));
        assert!(!has_complete_provenance(&record(Some(""), Some(5))));
        assert!(!has_complete_provenance(&record(Some("  "), Some(5))));
        assert!(!has_complete_provenance(&record(Some("N/A"), Some(5))));
        assert!(!has_complete_provenance(&record(Some("-"), Some(5))));
        assert!(!has_complete_provenance(&record(None, Some(5))));
        assert!(!has_complete_provenance(&record(Some("logs/app.log"), None)));
        assert!(!has_complete_provenance(&record(Some("logs/app.log"), Some(0))));
    }

    #[test]
    fn non_finite_scores_are_discarded() {
        let candidates = vec![
            ScoredRecord {
                record: record(Some("a.log"), Some(1)),
                score: f32::NAN,
            },
            ScoredRecord {
                record: record(Some("a.log"), Some(1)),
                score: 0.4,
            },
        ];
        let (kept, discarded) = filter_candidates(candidates);
        assert_eq!(kept.len(), 1);
        assert_eq!(discarded, 1);
    }

    #[test]
    fn content_hash_ignores_case_and_whitespace() {
        assert_eq!(
            content_hash("Disk full", "node-3  disk\nfull"),
            content_hash("disk full", "Node-3 disk full")
        );
        assert_ne!(content_hash("a", "bc"), content_hash("ab", "c"));
    }

    mod props {
        use super::super::*;
        use crate::fusion::fuse;
        use proptest::prelude::*;
        use rootcause_evidence_store::{EvidenceRecord, SourceKind};

        fn candidates(raw: &[(u8, u16)]) -> Vec<ScoredRecord> {
            // (id, score); four text variants force hash collisions across ids
            raw.iter()
                .map(|&(id, score)| ScoredRecord {
                    record: EvidenceRecord {
                        id: format!("rec-{id}"),
                        title: "Disk pressure".to_string(),
                        text: format!("disk usage at {} percent", id % 4),
                        source_kind: SourceKind::Log,
                        timestamp_ms: Some(1_000 + u64::from(id)),
                        origin: Some(format!("logs/{id}.log")),
                        vector: None,
                    },
                    score: f32::from(score) / 100.0,
                })
                .collect()
        }

        fn ranking(vector: &[ScoredRecord], lexical: &[ScoredRecord]) -> Vec<(String, f32)> {
            rank(dedup_by_content(fuse(Some(vector), Some(lexical), 0.7)), 50)
                .into_iter()
                .map(|i| (i.id, i.fused_score))
                .collect()
        }

        proptest! {
            #[test]
            fn fusion_ignores_candidate_arrival_order(
                v in prop::collection::vec((0u8..20, 0u16..1000), 0..12),
                l in prop::collection::vec((0u8..20, 0u16..1000), 0..12),
            ) {
                let vector = candidates(&v);
                let lexical = candidates(&l);
                let mut vector_rev = vector.clone();
                vector_rev.reverse();
                let mut lexical_rev = lexical.clone();
                lexical_rev.reverse();

                prop_assert_eq!(ranking(&vector, &lexical), ranking(&vector_rev, &lexical_rev));
            }

            #[test]
            fn dedup_keeps_only_best_per_content(
                v in prop::collection::vec((0u8..20, 0u16..1000), 1..12),
                l in prop::collection::vec((0u8..20, 0u16..1000), 0..12),
            ) {
                let fused = fuse(Some(&candidates(&v)), Some(&candidates(&l)), 0.7);
                let deduped = dedup_by_content(fused.clone());

                let mut seen = std::collections::HashSet::new();
                for item in &deduped {
                    prop_assert!(seen.insert(item.content_hash.clone()));
                    let best = fused
                        .iter()
                        .filter(|f| f.content_hash == item.content_hash)
                        .map(|f| f.fused_score)
                        .fold(f32::NEG_INFINITY, f32::max);
                    prop_assert_eq!(item.fused_score, best);
                }
                let distinct: std::collections::HashSet<_> =
                    fused.iter().map(|f| f.content_hash.clone()).collect();
                prop_assert_eq!(deduped.len(), distinct.len());
            }
        }
    }
}
