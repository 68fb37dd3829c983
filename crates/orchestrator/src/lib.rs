//! # Task Orchestrator
//!
//! Owns the lifecycle of analysis tasks:
//!
//! ```text
//! submit ──> PENDING ──(worker pool, lease)──> RUNNING ──> COMPLETED | FAILED | INTERRUPTED
//! ```
//!
//! - Every task record, execution lease and interrupt flag lives in a [`TaskStateStore`]
//!   (key-value with TTL). Status polling reads the store and nothing else.
//! - A runner holds the task's [`Lease`] and renews it on a heartbeat; RUNNING tasks whose
//!   lease expired are failed with `lease_expired` by [`Orchestrator::reap_abandoned`].
//! - Interrupts are short-lived, consume-once flags checked at stage boundaries only.

mod config;
mod error;
mod interrupt;
pub mod keys;
mod lease;
mod observer;
mod orchestrator;
mod pool;
mod record;
mod store;

pub use config::{
    OrchestratorConfig, ENV_INTERRUPT_TTL_MS, ENV_LEASE_TTL_MS, ENV_POLLING_INTERVAL_MS,
    ENV_WORKER_POOL_SIZE,
};
pub use error::{OrchestratorError, Result};
pub use interrupt::InterruptSignal;
pub use lease::{Heartbeat, Lease};
pub use observer::DISCARDED_SUMMARY;
pub use orchestrator::Orchestrator;
pub use pool::{PoolSnapshot, WorkerPool, MAX_WORKER_POOL_SIZE};
pub use record::{now_ms, TaskRecord, TaskRepository};
pub use store::{MemoryKvStore, TaskStateStore};
