//! # Hybrid Retrieval
//!
//! Ranked evidence from a vector backend and a lexical backend queried concurrently.
//!
//! ## Pipeline
//!
//! ```text
//! query ──┬──> VectorBackend::nearest  (k × multiplier, per-branch timeout)
//!         └──> LexicalBackend::search  (k × multiplier, per-branch timeout)
//!                 │
//!                 ├─ drop candidates with sentinel origin / timestamp
//!                 ├─ min-max normalise per branch
//!                 ├─ fused = α·v + (1-α)·l, renormalised over succeeded branches
//!                 ├─ dedup by SHA-256 of (title, normalised text)
//!                 └─ sort: fused ↓, recency ↓, id; truncate to k
//! ```

mod config;
mod error;
mod fusion;
mod hybrid;
mod query_classifier;
mod rerank;
mod types;

pub use config::{ClassAlpha, SearchConfig};
pub use error::{Result, SearchError};
pub use fusion::{fuse, FusionWeights};
pub use hybrid::HybridSearch;
pub use query_classifier::{QueryClass, QueryClassifier};
pub use rerank::{content_hash, has_complete_provenance};
pub use types::{Branch, BranchOutcome, BranchReport, EvidenceItem, SearchOutcome};
