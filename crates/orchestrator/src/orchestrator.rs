use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::interrupt::{self, InterruptSignal};
use crate::keys;
use crate::lease::Lease;
use crate::observer::TaskObserver;
use crate::pool::{PoolSnapshot, WorkerPool};
use crate::record::{now_ms, TaskRecord, TaskRepository};
use crate::store::{MemoryKvStore, TaskStateStore};
use rootcause_agents::{AgentToolkit, Pipeline, PipelineOutcome};
use rootcause_protocol::{AnalysisAccepted, ErrorClass, FailureInfo, TaskSnapshot, TaskState};
use std::sync::Arc;
use std::time::Duration;

/// Owns task lifecycle: submission, background execution, status, interruption.
///
/// The task-state store is the only source of truth; nothing about a task is cached
/// in process between calls.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: OrchestratorConfig,
    repo: TaskRepository,
    pipeline: Pipeline,
    pool: WorkerPool,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        toolkit: AgentToolkit,
        store: Arc<dyn TaskStateStore>,
    ) -> Result<Self> {
        config.validate()?;
        let pipeline = Pipeline::new(toolkit, config.pipeline.clone())?;
        let repo = TaskRepository::new(store, config.record_retention());
        let pool = WorkerPool::new(config.worker_pool_size);
        log::debug!(
            "orchestrator ready: {} workers, lease ttl {}ms",
            config.worker_pool_size,
            config.lease_ttl_ms
        );
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                repo,
                pipeline,
                pool,
            }),
        })
    }

    /// Orchestrator over an in-process [`MemoryKvStore`].
    pub fn in_memory(config: OrchestratorConfig, toolkit: AgentToolkit) -> Result<Self> {
        Self::new(config, toolkit, Arc::new(MemoryKvStore::new()))
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Create a PENDING task and schedule it; returns without waiting for execution.
    pub async fn submit(&self, input_text: &str, owner: &str) -> Result<String> {
        if input_text.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "input_text must not be empty".to_string(),
            ));
        }
        if self.inner.pool.is_closed() {
            return Err(OrchestratorError::PoolClosed);
        }
        let task_id = uuid::Uuid::new_v4().to_string();
        let record = TaskRecord::pending(&task_id, owner, input_text, now_ms());
        self.inner.repo.create(&record).await?;
        log::info!("Task {task_id} submitted by {owner}");

        let inner = self.inner.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            if let Err(err) = inner.execute(&id).await {
                log::warn!("Task {id}: runner error: {err}");
            }
        });
        Ok(task_id)
    }

    /// Submission response advertised to transport clients.
    #[must_use]
    pub fn accepted(&self, task_id: &str) -> AnalysisAccepted {
        AnalysisAccepted {
            task_id: task_id.to_string(),
            polling_interval_ms: self.inner.config.polling_interval_ms,
            supports_interruption: true,
        }
    }

    /// Latest persisted snapshot. Read-only and idempotent.
    pub async fn get_status(&self, task_id: &str) -> Result<TaskSnapshot> {
        self.inner
            .repo
            .load(task_id)
            .await?
            .map(|record| record.snapshot)
            .ok_or_else(|| OrchestratorError::NotFound(task_id.to_string()))
    }

    /// Request cooperative cancellation, observed at the next stage boundary.
    ///
    /// The request is written to the task record and to the short-lived interrupt flag.
    /// `false` when the task is already terminal.
    pub async fn interrupt(&self, task_id: &str, reason: &str) -> Result<bool> {
        let signal = InterruptSignal {
            reason: reason.to_string(),
            requested_at_ms: now_ms(),
        };
        let recorded = self
            .inner
            .repo
            .update(task_id, |r| {
                r.interrupt_request = Some(signal.clone());
                Ok(())
            })
            .await;
        let record = match recorded {
            Ok(record) => record,
            Err(OrchestratorError::InvalidTransition { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };
        interrupt::request(
            self.inner.repo.store().as_ref(),
            task_id,
            &signal,
            self.inner.config.interrupt_ttl(),
        )
        .await?;
        log::info!(
            "Task {task_id}: interrupt requested while {} ({reason})",
            record.status()
        );
        Ok(true)
    }

    /// Release the lease of a finished task and start its record's retention window.
    pub async fn cleanup(&self, task_id: &str) -> Result<()> {
        let snapshot = self.get_status(task_id).await?;
        if !snapshot.status.is_terminal() {
            return Err(OrchestratorError::TaskActive(task_id.to_string()));
        }
        let store = self.inner.repo.store();
        store.delete(&keys::lease(task_id)).await?;
        store.delete(&keys::interrupt(task_id)).await?;
        self.inner.repo.retain(task_id).await?;
        log::debug!("Task {task_id} cleaned up");
        Ok(())
    }

    /// Fail RUNNING tasks whose lease expired without renewal. Returns their ids.
    pub async fn reap_abandoned(&self) -> Result<Vec<String>> {
        let store = self.inner.repo.store();
        let mut reaped = Vec::new();
        for task_id in self.inner.repo.task_ids().await? {
            let Some(record) = self.inner.repo.load(&task_id).await? else {
                continue;
            };
            if record.status() != TaskState::Running {
                continue;
            }
            if store.get(&keys::lease(&task_id)).await?.is_some() {
                continue;
            }

            let failure = FailureInfo {
                stage: record.snapshot.current_stage,
                class: ErrorClass::LeaseExpired,
                message: OrchestratorError::LeaseExpired(task_id.clone()).to_string(),
            };
            let result = self
                .inner
                .repo
                .update(&task_id, |r| {
                    if r.status() != TaskState::Running {
                        return Ok(());
                    }
                    r.transition(TaskState::Failed, now_ms())?;
                    r.snapshot.error = Some(failure.clone());
                    Ok(())
                })
                .await;
            match result {
                Ok(updated) if updated.status() == TaskState::Failed => {
                    log::warn!("Task {task_id} abandoned: lease expired, marked FAILED");
                    reaped.push(task_id);
                }
                Ok(_) => {}
                Err(OrchestratorError::InvalidTransition { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(reaped)
    }

    /// Poll `get_status` until the task is terminal or `timeout` elapses.
    pub async fn wait_for_terminal(&self, task_id: &str, timeout: Duration) -> Result<TaskSnapshot> {
        let started = tokio::time::Instant::now();
        let interval = self.inner.config.polling_interval();
        loop {
            let snapshot = self.get_status(task_id).await?;
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(OrchestratorError::WaitTimeout {
                    task_id: task_id.to_string(),
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(interval.min(timeout - waited)).await;
        }
    }

    #[must_use]
    pub fn pool_snapshot(&self) -> PoolSnapshot {
        self.inner.pool.snapshot()
    }

    /// Stop admitting work. Running tasks finish; tasks still queued for a worker fail.
    pub fn shutdown(&self) {
        log::info!("orchestrator shutting down");
        self.inner.pool.close();
    }
}

impl Inner {
    /// Runs on the worker pool: lease, pipeline, terminal write.
    async fn execute(&self, task_id: &str) -> Result<()> {
        let _permit = match self.pool.acquire().await {
            Ok(permit) => permit,
            Err(OrchestratorError::PoolClosed) => return self.fail_unstarted(task_id).await,
            Err(err) => return Err(err),
        };
        let store = self.repo.store().clone();

        let Some(lease) = Lease::acquire(store, task_id, self.config.lease_ttl()).await? else {
            log::warn!("Task {task_id} is already executing elsewhere; skipping");
            return Ok(());
        };

        let outcome = self.run_leased(task_id, &lease).await;
        if let Err(err) = lease.release().await {
            log::warn!("Task {task_id}: lease release failed: {err}");
        }
        outcome
    }

    async fn fail_unstarted(&self, task_id: &str) -> Result<()> {
        let failure = FailureInfo {
            stage: None,
            class: ErrorClass::StageLogicError,
            message: "orchestrator shut down before the task started".to_string(),
        };
        let result = self
            .repo
            .update(task_id, |r| {
                r.snapshot.error = Some(failure.clone());
                r.transition(TaskState::Failed, now_ms())
            })
            .await;
        match result {
            Ok(_) | Err(OrchestratorError::InvalidTransition { .. }) => {
                log::warn!("Task {task_id} dropped from the queue: worker pool closed");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn run_leased(&self, task_id: &str, lease: &Lease) -> Result<()> {
        let record = self
            .repo
            .update(task_id, |r| r.transition(TaskState::Running, now_ms()))
            .await?;

        let heartbeat = lease.spawn_heartbeat(self.config.lease_renew_interval());
        let observer = TaskObserver::new(self.repo.clone(), task_id);
        let outcome = self
            .pipeline
            .run(task_id, &record.input_text, &observer)
            .await;
        if heartbeat.stop().await {
            log::warn!("Task {task_id}: lease was lost during execution; final write may be rejected");
        }

        let finished = self
            .repo
            .update(task_id, |r| {
                match &outcome {
                    PipelineOutcome::Completed { report, .. } => {
                        r.snapshot.final_result = Some(serde_json::to_value(report)?);
                        r.transition(TaskState::Completed, now_ms())?;
                    }
                    PipelineOutcome::Failed { error, .. } => {
                        r.snapshot.error = Some(error.to_failure());
                        r.transition(TaskState::Failed, now_ms())?;
                    }
                    PipelineOutcome::Interrupted { reason, .. } => {
                        r.snapshot.interrupt_reason = Some(reason.clone());
                        r.transition(TaskState::Interrupted, now_ms())?;
                    }
                }
                Ok(())
            })
            .await?;

        log::info!(
            "Task {task_id} finished {} (progress {:.2})",
            finished.status(),
            finished.snapshot.progress
        );
        Ok(())
    }
}
