use crate::error::{Result, StageError};
use rootcause_protocol::{FailureInfo, StageName};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const PLAN_KEY: &str = "plan";
pub const KNOWLEDGE_KEY: &str = "knowledge";
pub const HYPOTHESES_KEY: &str = "hypotheses";
pub const RECOMMENDATIONS_KEY: &str = "recommendations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMessage {
    pub stage: StageName,
    pub step_index: usize,
    pub content: String,
}

/// Payload threaded through the stages; exactly one stage writes it at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub task_id: String,
    pub input_text: String,
    pub step_index: usize,
    pub is_complete: bool,
    pub shared_context: BTreeMap<String, Value>,
    message_log: Vec<StageMessage>,
    pub error: Option<FailureInfo>,
}

impl AnalysisState {
    pub fn new(task_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            input_text: input_text.into(),
            step_index: 0,
            is_complete: false,
            shared_context: BTreeMap::new(),
            message_log: Vec::new(),
            error: None,
        }
    }

    /// Append-only; earlier messages are never edited.
    pub fn append_message(&mut self, stage: StageName, content: impl Into<String>) {
        self.message_log.push(StageMessage {
            stage,
            step_index: self.step_index,
            content: content.into(),
        });
    }

    #[must_use]
    pub fn messages(&self) -> &[StageMessage] {
        &self.message_log
    }

    #[must_use]
    pub fn last_message_from(&self, stage: StageName) -> Option<&StageMessage> {
        self.message_log.iter().rev().find(|m| m.stage == stage)
    }

    /// Typed read of a value published by an earlier stage.
    pub fn context<T: DeserializeOwned>(&self, stage: StageName, key: &str) -> Result<T> {
        let value = self
            .shared_context
            .get(key)
            .ok_or_else(|| StageError::logic(stage, format!("missing `{key}` in shared context")))?;
        serde_json::from_value(value.clone())
            .map_err(|err| StageError::logic(stage, format!("malformed `{key}`: {err}")))
    }

    pub fn publish<T: Serialize>(&mut self, stage: StageName, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|err| StageError::logic(stage, format!("cannot encode `{key}`: {err}")))?;
        self.shared_context.insert(key.to_string(), value);
        Ok(())
    }

    /// Mark the current step done and move to the next one.
    pub fn finish_step(&mut self) {
        self.is_complete = true;
        self.step_index += 1;
    }

    /// Reset the completion flag before handing the state to the next stage.
    pub fn begin_step(&mut self) {
        self.is_complete = false;
        self.error = None;
    }

    pub fn record_error(&mut self, error: &StageError) {
        self.is_complete = false;
        self.error = Some(error.to_failure());
    }
}
