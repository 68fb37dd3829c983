use crate::error::{Result, SearchError};
use crate::query_classifier::QueryClass;
use serde::{Deserialize, Serialize};

/// Retrieval and fusion knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Weight of the vector branch; the lexical branch gets `1 - alpha`
    pub default_alpha: f32,

    /// Each branch returns up to `k * candidate_multiplier` candidates
    pub candidate_multiplier: usize,

    /// Per-branch deadline; a late branch counts as failed
    pub branch_timeout_ms: u64,

    /// Default number of ranked items
    pub top_k: usize,

    /// Per-query-class alpha overrides
    pub class_alpha: ClassAlpha,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassAlpha {
    pub service_lookup: Option<f32>,
    pub symptomatic: Option<f32>,
    pub mixed: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_alpha: 0.7,
            candidate_multiplier: 3,
            branch_timeout_ms: 5_000,
            top_k: 10,
            class_alpha: ClassAlpha::default(),
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn alpha_for(&self, class: QueryClass) -> f32 {
        let overridden = match class {
            QueryClass::ServiceLookup => self.class_alpha.service_lookup,
            QueryClass::Symptomatic => self.class_alpha.symptomatic,
            QueryClass::Mixed => self.class_alpha.mixed,
        };
        overridden.unwrap_or(self.default_alpha)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let alphas = [
            ("default_alpha", Some(self.default_alpha)),
            ("class_alpha.service_lookup", self.class_alpha.service_lookup),
            ("class_alpha.symptomatic", self.class_alpha.symptomatic),
            ("class_alpha.mixed", self.class_alpha.mixed),
        ];
        for (name, value) in alphas {
            if let Some(alpha) = value {
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(SearchError::InvalidConfig(format!(
                        "{name} must be within [0, 1], got {alpha}"
                    )));
                }
            }
        }

        if self.candidate_multiplier == 0 {
            return Err(SearchError::InvalidConfig(
                "candidate_multiplier must be > 0".to_string(),
            ));
        }

        if self.top_k == 0 {
            return Err(SearchError::InvalidConfig("top_k must be > 0".to_string()));
        }

        if self.branch_timeout_ms == 0 {
            return Err(SearchError::InvalidConfig(
                "branch_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
