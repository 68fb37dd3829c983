use crate::error::{EvidenceStoreError, Result};
use crate::types::EvidenceRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const EVIDENCE_CORPUS_SCHEMA_VERSION: u32 = 1;

/// Evidence records persisted as a versioned JSON document.
///
/// The same file may carry other top-level sections (e.g. topology); they are ignored here.
#[derive(Debug, Clone, Default)]
pub struct EvidenceCorpus {
    records: Vec<EvidenceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEvidenceCorpus {
    schema_version: u32,
    #[serde(default)]
    records: Vec<EvidenceRecord>,
}

impl EvidenceCorpus {
    #[must_use]
    pub fn new(records: Vec<EvidenceRecord>) -> Self {
        Self { records }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let persisted: PersistedEvidenceCorpus = serde_json::from_slice(bytes)?;
        if persisted.schema_version != EVIDENCE_CORPUS_SCHEMA_VERSION {
            return Err(EvidenceStoreError::UnsupportedSchema {
                found: persisted.schema_version,
                expected: EVIDENCE_CORPUS_SCHEMA_VERSION,
            });
        }
        Ok(Self {
            records: persisted.records,
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let corpus = Self::from_json(&bytes)?;
        log::info!(
            "Loaded {} evidence records from {}",
            corpus.records.len(),
            path.display()
        );
        Ok(corpus)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedEvidenceCorpus {
            schema_version: EVIDENCE_CORPUS_SCHEMA_VERSION,
            records: self.records.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    #[must_use]
    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<EvidenceRecord> {
        self.records
    }
}
