use crate::backend::{LexicalBackend, VectorBackend};
use crate::embeddings::HashingEmbedder;
use crate::error::{EvidenceStoreError, Result};
use crate::text::tokenize;
use crate::types::{EvidenceRecord, MetadataFilter, ScoredRecord};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Brute-force cosine index held in memory.
pub struct InMemoryVectorIndex {
    dimension: usize,
    embedder: HashingEmbedder,
    records: Vec<(EvidenceRecord, Vec<f32>)>,
}

impl InMemoryVectorIndex {
    #[must_use]
    pub fn new(embedder: HashingEmbedder) -> Self {
        Self {
            dimension: embedder.dimension(),
            embedder,
            records: Vec::new(),
        }
    }

    pub fn from_records(
        embedder: HashingEmbedder,
        records: impl IntoIterator<Item = EvidenceRecord>,
    ) -> Result<Self> {
        let mut index = Self::new(embedder);
        for record in records {
            index.insert(record)?;
        }
        Ok(index)
    }

    /// Add a record, embedding `title + text` when it carries no vector.
    pub fn insert(&mut self, record: EvidenceRecord) -> Result<()> {
        let vector = match record.vector.clone() {
            Some(v) => v,
            None => self
                .embedder
                .embed(&format!("{} {}", record.title, record.text)),
        };
        if vector.len() != self.dimension {
            return Err(EvidenceStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.records.push((record, vector));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorIndex {
    fn name(&self) -> &str {
        "memory-vector"
    }

    async fn nearest(
        &self,
        query: &[f32],
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        if query.len() != self.dimension {
            return Err(EvidenceStoreError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<ScoredRecord> = self
            .records
            .iter()
            .filter(|(record, _)| filter.matches(record))
            .map(|(record, vector)| ScoredRecord {
                record: record.clone(),
                score: HashingEmbedder::cosine_similarity(query, vector),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        log::debug!("vector backend: {} hits (limit {limit})", hits.len());
        Ok(hits)
    }
}

/// BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// BM25 keyword index held in memory.
pub struct InMemoryLexicalIndex {
    cfg: Bm25Config,
    docs: Vec<(EvidenceRecord, Vec<String>)>,
    doc_freq: HashMap<String, usize>,
    total_len: usize,
}

impl Default for InMemoryLexicalIndex {
    fn default() -> Self {
        Self::new(Bm25Config::default())
    }
}

impl InMemoryLexicalIndex {
    #[must_use]
    pub fn new(cfg: Bm25Config) -> Self {
        Self {
            cfg,
            docs: Vec::new(),
            doc_freq: HashMap::new(),
            total_len: 0,
        }
    }

    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = EvidenceRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.insert(record);
        }
        index
    }

    pub fn insert(&mut self, record: EvidenceRecord) {
        let tokens = tokenize(&format!("{} {}", record.title, record.text));
        let mut seen = HashSet::new();
        for token in &tokens {
            if seen.insert(token.as_str()) {
                *self.doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }
        self.total_len += tokens.len();
        self.docs.push((record, tokens));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn score(&self, doc_tokens: &[String], query_terms: &[String]) -> f32 {
        if doc_tokens.is_empty() {
            return 0.0;
        }
        let total_docs = self.docs.len().max(1) as f32;
        let avg_len = (self.total_len as f32 / total_docs).max(1e-3);
        let dl = doc_tokens.len() as f32;

        let mut score = 0.0;
        for term in query_terms {
            let freq = doc_tokens.iter().filter(|t| *t == term).count() as f32;
            if freq <= 0.0 {
                continue;
            }
            let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
            let idf = bm25_idf(total_docs, df);
            let denom = freq + self.cfg.k1 * (1.0 - self.cfg.b + self.cfg.b * dl / avg_len);
            if denom > 0.0 {
                score += idf * (freq * (self.cfg.k1 + 1.0)) / denom;
            }
        }
        score
    }
}

fn bm25_idf(total_docs: f32, df: f32) -> f32 {
    ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln()
}

#[async_trait]
impl LexicalBackend for InMemoryLexicalIndex {
    fn name(&self) -> &str {
        "memory-bm25"
    }

    async fn search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<ScoredRecord> = self
            .docs
            .iter()
            .filter(|(record, _)| filter.matches(record))
            .filter_map(|(record, tokens)| {
                let score = self.score(tokens, &terms);
                (score > 0.0).then(|| ScoredRecord {
                    record: record.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        log::debug!("lexical backend: {} hits (limit {limit})", hits.len());
        Ok(hits)
    }
}
