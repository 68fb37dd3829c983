//! # Agent Pipeline
//!
//! Four stages over one [`AnalysisState`], strictly in order:
//!
//! ```text
//! Planner ──> Knowledge ──> Reasoning ──> Executor
//!   plan       entities,      ranked        scored
//!              topology,      hypotheses    recommendations
//!              evidence
//! ```
//!
//! Every stage implements `process(state) -> state'`. [`Pipeline::run`] owns the state
//! between stages, retries transient failures with bounded backoff, enforces the step
//! budget and polls a [`StageObserver`] for interrupts at each boundary.
//!
//! Planner, Reasoning and Executor are driven by [`RuleSet`] tables loaded as data.

mod completion;
mod config;
mod error;
mod executor;
mod knowledge;
mod model;
mod pipeline;
mod planner;
mod reasoning;
mod rules;
mod stage;
mod state;
mod toolkit;

pub use completion::{
    CompletionClient, CompletionConfig, CompletionError, CompletionRequest, CompletionResponse,
};
pub use config::{PipelineConfig, RetryPolicy};
pub use error::{Result, StageError};
pub use executor::Executor;
pub use knowledge::Knowledge;
pub use model::{
    AnalysisReport, ExecutionPlan, Hypothesis, KnowledgeSummary, PlanStep, Recommendation,
    RiskLevel, Symptom,
};
pub use pipeline::{Control, NoopObserver, Pipeline, PipelineOutcome, StageObserver};
pub use planner::Planner;
pub use reasoning::Reasoning;
pub use rules::RuleSet;
pub use stage::Stage;
pub use state::{
    AnalysisState, StageMessage, HYPOTHESES_KEY, KNOWLEDGE_KEY, PLAN_KEY, RECOMMENDATIONS_KEY,
};
pub use toolkit::AgentToolkit;
