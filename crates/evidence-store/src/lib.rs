//! # Evidence Store
//!
//! Narrow query adapters over the evidence backends used during incident analysis.
//!
//! ## Architecture
//!
//! ```text
//! EvidenceRecord[] (logs, docs, tickets, code)
//!     │
//!     ├──> VectorBackend   nearest-neighbour query + metadata filter
//!     │      └─> InMemoryVectorIndex (cosine, hashing embedder)
//!     │
//!     └──> LexicalBackend  ranked keyword query + metadata filter
//!            └─> InMemoryLexicalIndex (BM25)
//! ```
//!
//! Backends return raw, unfused scores. Fusion, deduplication and provenance
//! filtering belong to the retrieval engine.

mod backend;
mod corpus;
mod embeddings;
mod error;
mod memory;
mod text;
mod types;

pub use backend::{LexicalBackend, VectorBackend};
pub use corpus::{EvidenceCorpus, EVIDENCE_CORPUS_SCHEMA_VERSION};
pub use embeddings::{HashingEmbedder, DEFAULT_DIMENSION};
pub use error::{EvidenceStoreError, Result};
pub use memory::{Bm25Config, InMemoryLexicalIndex, InMemoryVectorIndex};
pub use text::{normalize_text, tokenize};
pub use types::{EvidenceRecord, MetadataFilter, ScoredRecord, SourceKind};
