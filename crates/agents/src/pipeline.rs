use crate::config::PipelineConfig;
use crate::error::{Result, StageError};
use crate::executor::Executor;
use crate::knowledge::Knowledge;
use crate::model::{AnalysisReport, ExecutionPlan, Hypothesis, KnowledgeSummary, Recommendation};
use crate::planner::Planner;
use crate::reasoning::Reasoning;
use crate::stage::Stage;
use crate::state::{AnalysisState, HYPOTHESES_KEY, KNOWLEDGE_KEY, PLAN_KEY, RECOMMENDATIONS_KEY};
use crate::toolkit::AgentToolkit;
use async_trait::async_trait;
use rootcause_protocol::StageName;
use serde_json::Value;
use std::time::{Duration, Instant};

/// What the runner should do at a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Continue,
    Interrupt { reason: String },
}

/// Receives stage lifecycle events and answers interrupt polls.
///
/// Calls arrive strictly in pipeline order from a single task; implementations
/// persist them wherever status readers look.
#[async_trait]
pub trait StageObserver: Send + Sync {
    /// Polled before the first stage and after every completed stage.
    async fn poll_interrupt(&self) -> Control;

    async fn stage_started(&self, stage: StageName, attempt: u32);

    /// A transient failure; the stage sleeps `delay` and then starts attempt `attempt + 1`.
    async fn stage_waiting(&self, stage: StageName, attempt: u32, delay: Duration, error: &StageError);

    async fn stage_completed(&self, stage: StageName, summary: &str, output: Option<&Value>);

    /// The stage finished but an interrupt arrived before its output could be merged.
    async fn stage_discarded(&self, stage: StageName);

    async fn stage_failed(&self, stage: StageName, error: &StageError);
}

/// Observer that never interrupts and records nothing.
pub struct NoopObserver;

#[async_trait]
impl StageObserver for NoopObserver {
    async fn poll_interrupt(&self) -> Control {
        Control::Continue
    }

    async fn stage_started(&self, _stage: StageName, _attempt: u32) {}

    async fn stage_waiting(&self, _: StageName, _: u32, _: Duration, _: &StageError) {}

    async fn stage_completed(&self, _: StageName, _: &str, _: Option<&Value>) {}

    async fn stage_discarded(&self, _stage: StageName) {}

    async fn stage_failed(&self, _stage: StageName, _error: &StageError) {}
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed {
        state: AnalysisState,
        report: AnalysisReport,
    },
    Failed {
        state: AnalysisState,
        error: StageError,
    },
    /// `discarded` names the stage whose finished output was dropped, if any.
    Interrupted {
        state: AnalysisState,
        reason: String,
        discarded: Option<StageName>,
    },
}

/// Fixed, ordered Planner -> Knowledge -> Reasoning -> Executor pipeline.
pub struct Pipeline {
    stages: [Stage; 4],
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(toolkit: AgentToolkit, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let AgentToolkit {
            rules,
            resolver,
            search,
            completion,
        } = toolkit;
        let stages = [
            Stage::Planner(Planner::new(rules.clone())),
            Stage::Knowledge(Knowledge::new(resolver, search)),
            Stage::Reasoning(Reasoning::new(
                rules.clone(),
                completion.clone(),
                config.completion.clone(),
            )),
            Stage::Executor(Executor::new(
                rules,
                config.top_hypotheses,
                completion,
                config.completion.clone(),
            )),
        ];
        Ok(Self { stages, config })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage in order for one task.
    ///
    /// Never returns `Err`: failures are reported as [`PipelineOutcome::Failed`] with the
    /// last successfully produced state.
    pub async fn run(
        &self,
        task_id: &str,
        input_text: &str,
        observer: &dyn StageObserver,
    ) -> PipelineOutcome {
        let mut state = AnalysisState::new(task_id, input_text);
        let mut steps = 0usize;

        if let Control::Interrupt { reason } = observer.poll_interrupt().await {
            log::info!("Task {task_id} interrupted before the first stage: {reason}");
            return PipelineOutcome::Interrupted {
                state,
                reason,
                discarded: None,
            };
        }

        for stage in &self.stages {
            let name = stage.name();
            let started = Instant::now();
            state.begin_step();

            let next = match self.run_stage(stage, &state, &mut steps, observer).await {
                Ok(next) => next,
                Err(error) => {
                    log::warn!("Task {task_id} failed at {name}: {error}");
                    observer.stage_failed(name, &error).await;
                    state.record_error(&error);
                    return PipelineOutcome::Failed { state, error };
                }
            };

            if let Control::Interrupt { reason } = observer.poll_interrupt().await {
                log::info!("Task {task_id} interrupted after {name}; discarding its output");
                observer.stage_discarded(name).await;
                return PipelineOutcome::Interrupted {
                    state,
                    reason,
                    discarded: Some(name),
                };
            }

            state = next;
            let summary = state
                .last_message_from(name)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            observer
                .stage_completed(name, &summary, state.shared_context.get(stage.output_key()))
                .await;
            log::info!(
                "Task {task_id}: {name} completed in {:.2?} ({summary})",
                started.elapsed()
            );
        }

        match self.report(&state) {
            Ok(report) => PipelineOutcome::Completed { state, report },
            Err(error) => {
                state.record_error(&error);
                PipelineOutcome::Failed { state, error }
            }
        }
    }

    /// Attempts of one stage, each counted against the step budget.
    async fn run_stage(
        &self,
        stage: &Stage,
        state: &AnalysisState,
        steps: &mut usize,
        observer: &dyn StageObserver,
    ) -> Result<AnalysisState> {
        let name = stage.name();
        let retry = &self.config.retry;
        let mut attempt = 1u32;
        observer.stage_started(name, attempt).await;

        loop {
            if *steps >= self.config.max_steps {
                return Err(StageError::StepBudgetExceeded {
                    stage: name,
                    steps: *steps,
                    max_steps: self.config.max_steps,
                });
            }
            *steps += 1;
            log::debug!("{name}: attempt {attempt} (step {steps})");

            let error = match tokio::time::timeout(self.config.stage_timeout(), stage.process(state))
                .await
            {
                Ok(Ok(next)) if next.is_complete => return Ok(next),
                Ok(Ok(next)) => next.error.as_ref().map_or_else(
                    || StageError::logic(name, "stage returned without completing"),
                    |failure| StageError::logic(name, failure.message.clone()),
                ),
                Ok(Err(err)) => err,
                Err(_) => StageError::Timeout {
                    stage: name,
                    message: format!("no result within {}ms", self.config.stage_timeout_ms),
                },
            };

            if !error.is_transient() || attempt >= retry.max_attempts {
                return Err(error);
            }

            let delay = retry.delay_for(attempt);
            log::warn!(
                "{name}: attempt {attempt}/{} failed ({error}); retrying in {delay:?}",
                retry.max_attempts
            );
            observer.stage_waiting(name, attempt, delay, &error).await;
            tokio::time::sleep(delay).await;
            attempt += 1;
            observer.stage_started(name, attempt).await;
        }
    }

    fn report(&self, state: &AnalysisState) -> Result<AnalysisReport> {
        let plan: ExecutionPlan = state.context(StageName::Executor, PLAN_KEY)?;
        let knowledge: KnowledgeSummary = state.context(StageName::Executor, KNOWLEDGE_KEY)?;
        let mut hypotheses: Vec<Hypothesis> = state.context(StageName::Executor, HYPOTHESES_KEY)?;
        let recommendations: Vec<Recommendation> =
            state.context(StageName::Executor, RECOMMENDATIONS_KEY)?;
        hypotheses.truncate(self.config.top_hypotheses);

        Ok(AnalysisReport {
            plan,
            entities: knowledge.entities,
            evidence_count: knowledge.evidence.len(),
            hypotheses,
            recommendations,
        })
    }
}
