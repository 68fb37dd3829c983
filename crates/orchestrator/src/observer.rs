use crate::error::Result;
use crate::interrupt;
use crate::record::{now_ms, TaskRecord, TaskRepository};
use async_trait::async_trait;
use rootcause_agents::{Control, StageError, StageObserver};
use rootcause_protocol::{AgentRecord, StageName};
use serde_json::Value;
use std::time::Duration;

pub const DISCARDED_SUMMARY: &str = "result discarded: interrupted";

/// Persists stage events into the task record and polls the interrupt flag.
pub(crate) struct TaskObserver {
    repo: TaskRepository,
    task_id: String,
}

impl TaskObserver {
    pub(crate) fn new(repo: TaskRepository, task_id: impl Into<String>) -> Self {
        Self {
            repo,
            task_id: task_id.into(),
        }
    }

    async fn write<F>(&self, what: &str, apply: F)
    where
        F: FnMut(&mut TaskRecord) -> Result<()> + Send,
    {
        if let Err(err) = self.repo.update(&self.task_id, apply).await {
            log::warn!("task {}: could not record {what}: {err}", self.task_id);
        }
    }

    /// The request kept on the task record, for when the flag already expired.
    async fn recorded_interrupt(&self) -> Control {
        match self.repo.load(&self.task_id).await {
            Ok(Some(TaskRecord {
                interrupt_request: Some(signal),
                ..
            })) => {
                log::debug!("task {}: interrupt flag expired, using the task record", self.task_id);
                Control::Interrupt {
                    reason: signal.reason,
                }
            }
            Ok(_) => Control::Continue,
            Err(err) => {
                log::warn!("task {}: could not read the task record: {err}", self.task_id);
                Control::Continue
            }
        }
    }
}

#[async_trait]
impl StageObserver for TaskObserver {
    async fn poll_interrupt(&self) -> Control {
        match interrupt::take(self.repo.store().as_ref(), &self.task_id).await {
            Ok(Some(signal)) => Control::Interrupt {
                reason: signal.reason,
            },
            Ok(None) => self.recorded_interrupt().await,
            Err(err) => {
                log::warn!("task {}: interrupt poll failed: {err}", self.task_id);
                self.recorded_interrupt().await
            }
        }
    }

    async fn stage_started(&self, stage: StageName, attempt: u32) {
        self.write("stage start", |record| {
            record.snapshot.current_stage = Some(stage);
            match record.agent_record_mut(stage) {
                Some(existing) if attempt > 1 => existing.retrying(),
                Some(_) => {}
                None => record
                    .snapshot
                    .stage_statuses
                    .push(AgentRecord::started(stage, now_ms())),
            }
            Ok(())
        })
        .await;
    }

    async fn stage_waiting(
        &self,
        stage: StageName,
        _attempt: u32,
        _delay: Duration,
        error: &StageError,
    ) {
        let message = error.to_string();
        self.write("stage backoff", |record| {
            if let Some(existing) = record.agent_record_mut(stage) {
                existing.waiting_for_retry();
                existing.summary = Some(format!("retrying after: {message}"));
            }
            Ok(())
        })
        .await;
    }

    async fn stage_completed(&self, stage: StageName, summary: &str, output: Option<&Value>) {
        self.write("stage completion", |record| {
            if let Some(existing) = record.agent_record_mut(stage) {
                existing.complete(now_ms(), summary);
            }
            if let Some(output) = output {
                record
                    .snapshot
                    .intermediate_results
                    .insert(stage.as_str().to_string(), output.clone());
            }
            record.refresh_progress();
            Ok(())
        })
        .await;
    }

    async fn stage_discarded(&self, stage: StageName) {
        self.write("discarded stage", |record| {
            if let Some(existing) = record.agent_record_mut(stage) {
                existing.complete(now_ms(), DISCARDED_SUMMARY);
            }
            Ok(())
        })
        .await;
    }

    async fn stage_failed(&self, stage: StageName, error: &StageError) {
        let failure = error.to_failure();
        self.write("stage failure", |record| {
            if let Some(existing) = record.agent_record_mut(stage) {
                existing.fail(now_ms(), failure.clone());
            }
            Ok(())
        })
        .await;
    }
}
