use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of an analysis task.
///
/// ```text
/// PENDING ──> RUNNING ──> COMPLETED
///    │           ├──────> FAILED
///    │           └──────> INTERRUPTED
///    └──> FAILED | INTERRUPTED   (never started)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl TaskState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Interrupted)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Failed | Self::Interrupted),
            Self::Running => matches!(next, Self::Completed | Self::Failed | Self::Interrupted),
            Self::Completed | Self::Failed | Self::Interrupted => false,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four pipeline stages, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Planner,
    Knowledge,
    Reasoning,
    Executor,
}

impl StageName {
    pub const ORDER: [StageName; 4] = [
        StageName::Planner,
        StageName::Knowledge,
        StageName::Reasoning,
        StageName::Executor,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Planner => 0,
            Self::Knowledge => 1,
            Self::Reasoning => 2,
            Self::Executor => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Knowledge => "knowledge",
            Self::Reasoning => "reasoning",
            Self::Executor => "executor",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    /// Started, but backing off before a retry.
    Waiting,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = match self {
            Self::Waiting => "WAITING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(raw)
    }
}

/// Error classification delivered through status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    InvalidInput,
    NotFound,
    RetrievalUnavailable,
    StepBudgetExceeded,
    StageTimeout,
    StageConnectionError,
    StageLogicError,
    LeaseExpired,
}

impl ErrorClass {
    /// Transient classes are retried in place with backoff.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::StageTimeout | Self::StageConnectionError | Self::RetrievalUnavailable
        )
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::RetrievalUnavailable => "retrieval_unavailable",
            Self::StepBudgetExceeded => "step_budget_exceeded",
            Self::StageTimeout => "stage_timeout",
            Self::StageConnectionError => "stage_connection_error",
            Self::StageLogicError => "stage_logic_error",
            Self::LeaseExpired => "lease_expired",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a task failed: originating stage (if any) plus classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailureInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageName>,
    pub class: ErrorClass,
    pub message: String,
}

/// Per-stage execution record. One per started stage, never more than the pipeline length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentRecord {
    pub stage: StageName,
    pub status: AgentStatus,
    pub started_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
}

impl AgentRecord {
    #[must_use]
    pub fn started(stage: StageName, now_ms: u64) -> Self {
        Self {
            stage,
            status: AgentStatus::Running,
            started_at_ms: now_ms,
            ended_at_ms: None,
            attempts: 1,
            summary: None,
            error: None,
        }
    }

    pub fn waiting_for_retry(&mut self) {
        self.status = AgentStatus::Waiting;
    }

    pub fn retrying(&mut self) {
        self.status = AgentStatus::Running;
        self.attempts += 1;
    }

    pub fn complete(&mut self, now_ms: u64, summary: impl Into<String>) {
        self.status = AgentStatus::Completed;
        self.ended_at_ms = Some(now_ms);
        self.summary = Some(summary.into());
    }

    pub fn fail(&mut self, now_ms: u64, error: FailureInfo) {
        self.status = AgentStatus::Failed;
        self.ended_at_ms = Some(now_ms);
        self.error = Some(error);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.status, AgentStatus::Completed | AgentStatus::Failed)
    }
}

/// Latest persisted view of a task, as returned by status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub owner: String,
    pub status: TaskState,
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageName>,
    pub created_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    pub stage_statuses: Vec<AgentRecord>,
    /// Outputs of stages that completed, keyed by stage name.
    pub intermediate_results: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskState; 5] = [
        TaskState::Pending,
        TaskState::Running,
        TaskState::Completed,
        TaskState::Failed,
        TaskState::Interrupted,
    ];

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn running_is_only_reachable_from_pending() {
        for from in ALL {
            let allowed = from.can_transition_to(TaskState::Running);
            assert_eq!(allowed, from == TaskState::Pending, "{from}");
        }
    }

    #[test]
    fn stage_order_matches_index() {
        for (idx, stage) in StageName::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), idx);
        }
    }

    #[test]
    fn agent_record_counts_retries() {
        let mut record = AgentRecord::started(StageName::Knowledge, 10);
        record.waiting_for_retry();
        assert_eq!(record.status, AgentStatus::Waiting);
        record.retrying();
        assert_eq!(record.attempts, 2);
        record.complete(20, "ok");
        assert!(record.is_finished());
        assert_eq!(record.ended_at_ms, Some(20));
    }

    #[test]
    fn error_class_serializes_as_snake_case() {
        let raw = serde_json::to_string(&ErrorClass::StepBudgetExceeded).unwrap();
        assert_eq!(raw, "\"step_budget_exceeded\"");
        assert!(ErrorClass::StageTimeout.is_transient());
        assert!(!ErrorClass::StageLogicError.is_transient());
    }
}
