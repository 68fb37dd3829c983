use crate::error::{OrchestratorError, Result};
use crate::interrupt::InterruptSignal;
use crate::keys;
use crate::store::TaskStateStore;
use rootcause_protocol::{AgentRecord, AgentStatus, StageName, TaskSnapshot, TaskState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_UPDATE_ATTEMPTS: usize = 8;

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Persisted task: the polled snapshot plus the submitted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub input_text: String,
    /// Accepted interrupt request. Outlives the short-lived flag so a late boundary still sees it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_request: Option<InterruptSignal>,
    #[serde(flatten)]
    pub snapshot: TaskSnapshot,
}

impl TaskRecord {
    #[must_use]
    pub fn pending(task_id: &str, owner: &str, input_text: &str, now_ms: u64) -> Self {
        Self {
            input_text: input_text.to_string(),
            interrupt_request: None,
            snapshot: TaskSnapshot {
                task_id: task_id.to_string(),
                owner: owner.to_string(),
                status: TaskState::Pending,
                progress: 0.0,
                current_stage: None,
                created_at_ms: now_ms,
                started_at_ms: None,
                ended_at_ms: None,
                stage_statuses: Vec::new(),
                intermediate_results: BTreeMap::new(),
                final_result: None,
                error: None,
                interrupt_reason: None,
            },
        }
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.snapshot.task_id
    }

    #[must_use]
    pub fn status(&self) -> TaskState {
        self.snapshot.status
    }

    /// Apply a state-machine transition, stamping start / end times.
    pub fn transition(&mut self, next: TaskState, now_ms: u64) -> Result<()> {
        let from = self.snapshot.status;
        if !from.can_transition_to(next) {
            return Err(OrchestratorError::InvalidTransition {
                task_id: self.snapshot.task_id.clone(),
                from,
                to: next,
            });
        }
        self.snapshot.status = next;
        if next == TaskState::Running {
            self.snapshot.started_at_ms = Some(now_ms);
        }
        if next.is_terminal() {
            self.snapshot.ended_at_ms = Some(now_ms);
        }
        if next == TaskState::Completed {
            self.snapshot.progress = 1.0;
        }
        Ok(())
    }

    #[must_use]
    pub fn agent_record_mut(&mut self, stage: StageName) -> Option<&mut AgentRecord> {
        self.snapshot
            .stage_statuses
            .iter_mut()
            .find(|r| r.stage == stage)
    }

    /// Completed stages over pipeline length.
    pub fn refresh_progress(&mut self) {
        let completed = self
            .snapshot
            .stage_statuses
            .iter()
            .filter(|r| r.status == AgentStatus::Completed)
            .count();
        self.snapshot.progress = completed as f32 / StageName::ORDER.len() as f32;
    }
}

/// Typed access to task records with optimistic concurrency.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn TaskStateStore>,
    retention: Duration,
}

impl TaskRepository {
    #[must_use]
    pub fn new(store: Arc<dyn TaskStateStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TaskStateStore> {
        &self.store
    }

    /// Persist a new record; fails if the id is already taken.
    pub async fn create(&self, record: &TaskRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        let created = self
            .store
            .put_if_absent(&keys::task(record.task_id()), raw, None)
            .await?;
        if !created {
            return Err(OrchestratorError::Store(format!(
                "task {} already exists",
                record.task_id()
            )));
        }
        Ok(())
    }

    pub async fn load(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        match self.store.get(&keys::task(task_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write with compare-and-set; retried on concurrent writes.
    ///
    /// Terminal records are immutable: `apply` is never called on them. The write that
    /// makes a record terminal starts its retention window.
    pub async fn update<F>(&self, task_id: &str, mut apply: F) -> Result<TaskRecord>
    where
        F: FnMut(&mut TaskRecord) -> Result<()> + Send,
    {
        let key = keys::task(task_id);
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let raw = self
                .store
                .get(&key)
                .await?
                .ok_or_else(|| OrchestratorError::NotFound(task_id.to_string()))?;
            let mut record: TaskRecord = serde_json::from_str(&raw)?;
            let from = record.status();
            if from.is_terminal() {
                return Err(OrchestratorError::InvalidTransition {
                    task_id: task_id.to_string(),
                    from,
                    to: from,
                });
            }
            apply(&mut record)?;

            let ttl = record.status().is_terminal().then_some(self.retention);
            let encoded = serde_json::to_string(&record)?;
            if self.store.compare_and_set(&key, &raw, encoded, ttl).await? {
                return Ok(record);
            }
            log::debug!("concurrent update of task {task_id}; retrying");
        }
        Err(OrchestratorError::Store(format!(
            "task {task_id}: gave up after {MAX_UPDATE_ATTEMPTS} conflicting updates"
        )))
    }

    /// Ids of every live task record.
    pub async fn task_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys(keys::TASK_PREFIX)
            .await?
            .iter()
            .filter_map(|k| keys::task_id_of(k).map(str::to_string))
            .collect())
    }

    /// Start the retention window of a finished record.
    pub async fn retain(&self, task_id: &str) -> Result<bool> {
        self.store.expire(&keys::task(task_id), self.retention).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;
    use proptest::prelude::*;

    const ALL: [TaskState; 5] = [
        TaskState::Pending,
        TaskState::Running,
        TaskState::Completed,
        TaskState::Failed,
        TaskState::Interrupted,
    ];

    fn repo() -> TaskRepository {
        TaskRepository::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(60))
    }

    #[test]
    fn transitions_stamp_times_and_progress() {
        let mut record = TaskRecord::pending("t-1", "ops", "disk full", 10);
        record.transition(TaskState::Running, 20).unwrap();
        assert_eq!(record.snapshot.started_at_ms, Some(20));
        record.transition(TaskState::Completed, 30).unwrap();
        assert_eq!(record.snapshot.ended_at_ms, Some(30));
        assert_eq!(record.snapshot.progress, 1.0);
        assert!(record.transition(TaskState::Running, 40).is_err());
    }

    #[test]
    fn record_serializes_flat() {
        let record = TaskRecord::pending("t-1", "ops", "disk full", 10);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["task_id"], "t-1");
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["input_text"], "disk full");
    }

    #[tokio::test]
    async fn terminal_records_are_immutable() {
        let repo = repo();
        repo.create(&TaskRecord::pending("t-1", "ops", "x", 1))
            .await
            .unwrap();
        repo.update("t-1", |r| r.transition(TaskState::Running, 2))
            .await
            .unwrap();
        repo.update("t-1", |r| r.transition(TaskState::Failed, 3))
            .await
            .unwrap();

        let err = repo
            .update("t-1", |r| {
                r.snapshot.progress = 0.5;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert_eq!(repo.load("t-1").await.unwrap().unwrap().snapshot.progress, 0.0);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let repo = repo();
        let record = TaskRecord::pending("t-1", "ops", "x", 1);
        repo.create(&record).await.unwrap();
        assert!(repo.create(&record).await.is_err());
        assert_eq!(repo.task_ids().await.unwrap(), vec!["t-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_update_leaves_record_untouched() {
        let repo = repo();
        repo.create(&TaskRecord::pending("t-1", "ops", "x", 1))
            .await
            .unwrap();
        let err = repo
            .update("t-1", |r| r.transition(TaskState::Completed, 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidTransition {
                from: TaskState::Pending,
                to: TaskState::Completed,
                ..
            }
        ));
        assert_eq!(
            repo.load("t-1").await.unwrap().unwrap().status(),
            TaskState::Pending
        );
    }

    proptest! {
        #[test]
        fn no_transition_leaves_a_terminal_state(targets in prop::collection::vec(0usize..5, 0..12)) {
            let mut record = TaskRecord::pending("t-p", "ops", "x", 0);
            let mut terminal_seen = false;
            for (step, idx) in targets.into_iter().enumerate() {
                let next = ALL[idx];
                let before = record.status();
                let applied = record.transition(next, step as u64).is_ok();
                prop_assert_eq!(applied, before.can_transition_to(next));
                if terminal_seen {
                    prop_assert!(!applied);
                    prop_assert_eq!(record.status(), before);
                }
                terminal_seen |= record.status().is_terminal();
            }
        }
    }
}
