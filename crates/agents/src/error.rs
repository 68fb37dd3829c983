use rootcause_protocol::{ErrorClass, FailureInfo, StageName};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StageError>;

#[derive(Error, Debug, Clone)]
pub enum StageError {
    #[error("{stage} timed out: {message}")]
    Timeout { stage: StageName, message: String },

    #[error("{stage} connection error: {message}")]
    Connection { stage: StageName, message: String },

    #[error("{stage} retrieval unavailable: {message}")]
    RetrievalUnavailable { stage: StageName, message: String },

    #[error("{stage} failed: {message}")]
    Logic { stage: StageName, message: String },

    #[error("Step budget exceeded at {stage}: {steps} steps taken, limit {max_steps}")]
    StepBudgetExceeded {
        stage: StageName,
        steps: usize,
        max_steps: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid rule table: {0}")]
    RuleTable(String),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Toolkit setup failed: {0}")]
    Setup(String),
}

impl StageError {
    pub fn logic(stage: StageName, message: impl Into<String>) -> Self {
        Self::Logic {
            stage,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout { .. } => ErrorClass::StageTimeout,
            Self::Connection { .. } => ErrorClass::StageConnectionError,
            Self::RetrievalUnavailable { .. } => ErrorClass::RetrievalUnavailable,
            Self::Logic { .. } | Self::RuleTable(_) | Self::InvalidConfig(_) | Self::Setup(_) => {
                ErrorClass::StageLogicError
            }
            Self::StepBudgetExceeded { .. } => ErrorClass::StepBudgetExceeded,
            Self::InvalidInput(_) => ErrorClass::InvalidInput,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> Option<StageName> {
        match self {
            Self::Timeout { stage, .. }
            | Self::Connection { stage, .. }
            | Self::RetrievalUnavailable { stage, .. }
            | Self::Logic { stage, .. }
            | Self::StepBudgetExceeded { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Timeouts, connection errors and retrieval outages are retried with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.class().is_transient()
    }

    #[must_use]
    pub fn to_failure(&self) -> FailureInfo {
        FailureInfo {
            stage: self.stage(),
            class: self.class(),
            message: self.to_string(),
        }
    }
}

impl From<toml::de::Error> for StageError {
    fn from(err: toml::de::Error) -> Self {
        Self::RuleTable(err.to_string())
    }
}

impl From<rootcause_search::SearchError> for StageError {
    fn from(err: rootcause_search::SearchError) -> Self {
        use rootcause_search::SearchError;
        let stage = StageName::Knowledge;
        let message = err.to_string();
        match err {
            SearchError::RetrievalUnavailable { .. } => Self::RetrievalUnavailable { stage, message },
            _ => Self::Logic { stage, message },
        }
    }
}

impl From<rootcause_graph::GraphError> for StageError {
    fn from(err: rootcause_graph::GraphError) -> Self {
        use rootcause_graph::GraphError;
        let stage = StageName::Knowledge;
        let message = err.to_string();
        match err {
            GraphError::StoreError(_) | GraphError::IoError(_) => Self::Connection { stage, message },
            _ => Self::Logic { stage, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_drives_retry() {
        let timeout = StageError::Timeout {
            stage: StageName::Reasoning,
            message: "30s".to_string(),
        };
        assert!(timeout.is_transient());
        assert_eq!(timeout.to_failure().stage, Some(StageName::Reasoning));

        let logic = StageError::logic(StageName::Executor, "no templates");
        assert!(!logic.is_transient());
        assert_eq!(logic.class(), ErrorClass::StageLogicError);

        let budget = StageError::StepBudgetExceeded {
            stage: StageName::Knowledge,
            steps: 12,
            max_steps: 12,
        };
        assert_eq!(budget.class(), ErrorClass::StepBudgetExceeded);
        assert_eq!(budget.stage(), Some(StageName::Knowledge));
    }

    #[test]
    fn both_branches_down_is_transient() {
        let err: StageError = rootcause_search::SearchError::RetrievalUnavailable {
            vector: "down".to_string(),
            lexical: "down".to_string(),
        }
        .into();
        assert_eq!(err.class(), ErrorClass::RetrievalUnavailable);
        assert!(err.is_transient());
    }
}
