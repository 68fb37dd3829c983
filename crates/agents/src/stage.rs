use crate::error::Result;
use crate::executor::Executor;
use crate::knowledge::Knowledge;
use crate::planner::Planner;
use crate::reasoning::Reasoning;
use crate::state::{AnalysisState, HYPOTHESES_KEY, KNOWLEDGE_KEY, PLAN_KEY, RECOMMENDATIONS_KEY};
use rootcause_protocol::StageName;

/// The closed set of pipeline stages behind one `process(state) -> state'` interface.
pub enum Stage {
    Planner(Planner),
    Knowledge(Knowledge),
    Reasoning(Reasoning),
    Executor(Executor),
}

impl Stage {
    #[must_use]
    pub const fn name(&self) -> StageName {
        match self {
            Self::Planner(_) => StageName::Planner,
            Self::Knowledge(_) => StageName::Knowledge,
            Self::Reasoning(_) => StageName::Reasoning,
            Self::Executor(_) => StageName::Executor,
        }
    }

    /// Shared-context key the stage publishes its output under.
    #[must_use]
    pub const fn output_key(&self) -> &'static str {
        match self {
            Self::Planner(_) => PLAN_KEY,
            Self::Knowledge(_) => KNOWLEDGE_KEY,
            Self::Reasoning(_) => HYPOTHESES_KEY,
            Self::Executor(_) => RECOMMENDATIONS_KEY,
        }
    }

    /// Reads `state`, returns the successor state. The input is left untouched so a
    /// failed attempt can be retried from the same point.
    pub async fn process(&self, state: &AnalysisState) -> Result<AnalysisState> {
        match self {
            Self::Planner(stage) => stage.process(state).await,
            Self::Knowledge(stage) => stage.process(state).await,
            Self::Reasoning(stage) => stage.process(state).await,
            Self::Executor(stage) => stage.process(state).await,
        }
    }
}
