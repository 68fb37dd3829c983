use crate::rerank::content_hash;
use crate::types::EvidenceItem;
use rootcause_evidence_store::ScoredRecord;
use std::collections::{BTreeMap, HashMap};

/// Min-max normalisation by record id.
///
/// A single candidate, or a branch whose scores are all equal, normalises to 1.0.
pub(crate) fn min_max_normalize(candidates: &[ScoredRecord]) -> HashMap<String, f32> {
    let mut best: HashMap<String, f32> = HashMap::new();
    for c in candidates {
        let slot = best.entry(c.record.id.clone()).or_insert(c.score);
        *slot = slot.max(c.score);
    }

    let (min, max) = best
        .values()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    let span = max - min;

    best.into_iter()
        .map(|(id, s)| {
            let norm = if span <= f32::EPSILON {
                1.0
            } else {
                (s - min) / span
            };
            (id, norm)
        })
        .collect()
}

/// Branch weights after renormalising over the branches that succeeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub lexical: f32,
}

impl FusionWeights {
    /// `None` when neither branch succeeded.
    #[must_use]
    pub fn resolve(alpha: f32, vector_ok: bool, lexical_ok: bool) -> Option<Self> {
        let alpha = alpha.clamp(0.0, 1.0);
        let vector = if vector_ok { alpha } else { 0.0 };
        let lexical = if lexical_ok { 1.0 - alpha } else { 0.0 };
        let total = vector + lexical;
        if total > f32::EPSILON {
            return Some(Self {
                vector: vector / total,
                lexical: lexical / total,
            });
        }
        // alpha of exactly 0 or 1 with the weighted branch down: use what we have
        match (vector_ok, lexical_ok) {
            (true, _) => Some(Self {
                vector: 1.0,
                lexical: 0.0,
            }),
            (false, true) => Some(Self {
                vector: 0.0,
                lexical: 1.0,
            }),
            (false, false) => None,
        }
    }
}

/// Weighted fusion of normalised branch scores: `fused = w_v·norm(v) + w_l·norm(l)`.
///
/// `None` marks a failed branch. Within a succeeded branch a missing candidate
/// contributes 0 for that branch. Candidates must already be provenance-filtered.
pub fn fuse(
    vector: Option<&[ScoredRecord]>,
    lexical: Option<&[ScoredRecord]>,
    alpha: f32,
) -> Vec<EvidenceItem> {
    let Some(weights) = FusionWeights::resolve(alpha, vector.is_some(), lexical.is_some()) else {
        return Vec::new();
    };

    let vector_norm = vector.map(min_max_normalize).unwrap_or_default();
    let lexical_norm = lexical.map(min_max_normalize).unwrap_or_default();

    // id -> (record, raw vector score, raw lexical score)
    let mut merged: BTreeMap<&str, (&ScoredRecord, Option<f32>, Option<f32>)> = BTreeMap::new();
    for c in vector.unwrap_or_default() {
        let entry = merged.entry(c.record.id.as_str()).or_insert((c, None, None));
        entry.1 = Some(entry.1.map_or(c.score, |s| s.max(c.score)));
    }
    for c in lexical.unwrap_or_default() {
        let entry = merged.entry(c.record.id.as_str()).or_insert((c, None, None));
        entry.2 = Some(entry.2.map_or(c.score, |s| s.max(c.score)));
    }

    merged
        .into_iter()
        .filter_map(|(id, (scored, vector_score, lexical_score))| {
            let record = &scored.record;
            let fused = weights.vector * vector_norm.get(id).copied().unwrap_or(0.0)
                + weights.lexical * lexical_norm.get(id).copied().unwrap_or(0.0);
            Some(EvidenceItem {
                id: record.id.clone(),
                title: record.title.clone(),
                text: record.text.clone(),
                source_kind: record.source_kind,
                vector_score,
                lexical_score,
                fused_score: fused,
                timestamp_ms: record.timestamp_ms?,
                origin: record.origin.clone()?,
                content_hash: content_hash(&record.title, &record.text),
            })
        })
        .collect()
}
