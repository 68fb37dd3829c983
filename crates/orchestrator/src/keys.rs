//! Key layout of the task-state store.

pub const TASK_PREFIX: &str = "task:";

#[must_use]
pub fn task(task_id: &str) -> String {
    format!("{TASK_PREFIX}{task_id}")
}

#[must_use]
pub fn lease(task_id: &str) -> String {
    format!("lease:{task_id}")
}

#[must_use]
pub fn interrupt(task_id: &str) -> String {
    format!("interrupt:{task_id}")
}

#[must_use]
pub fn task_id_of(key: &str) -> Option<&str> {
    key.strip_prefix(TASK_PREFIX)
}
