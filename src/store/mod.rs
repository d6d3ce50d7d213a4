//! Job storage: the engine's single source of truth.
//!
//! [`JobStore`] is the storage-agnostic contract every backend must honor;
//! [`InMemoryStore`] is the in-process implementation used by this
//! single-node deployment. All mutation goes through the store's atomic
//! operations, which are linearizable per job id.

mod job;
mod memory;

pub use job::{Job, JobStatus, Outcome};
pub use memory::InMemoryStore;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed submission, rejected before any record is created.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced job id does not exist.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Another claimant won the QUEUED → RUNNING race. Benign; the
    /// dispatcher simply tries the next candidate.
    #[error("job already claimed: {0}")]
    AlreadyClaimed(String),

    /// Completion was attempted on a job that is not RUNNING, which means
    /// a protocol violation such as a double completion.
    #[error("job {id} is {status}, expected RUNNING")]
    InvalidState { id: String, status: JobStatus },
}

/// Atomic job storage contract.
///
/// `try_claim` and `complete_attempt` must be linearizable per job id:
/// any number of callers racing on the same id yield exactly one winner,
/// never zero and never two. Internal locking may be coarse but must only
/// cover the brief transition itself, never job execution.
pub trait JobStore: Send + Sync {
    /// Insert a new QUEUED job with zero attempts, immediately visible to
    /// subsequent reads. Rejects `max_attempts < 1` and an empty type with
    /// [`StoreError::InvalidArgument`].
    fn create(&self, job_type: &str, payload: Value, max_attempts: u32) -> Result<Job, StoreError>;

    /// Snapshot of one job.
    fn get(&self, id: &str) -> Result<Job, StoreError>;

    /// Snapshot of all jobs, in creation order. No record is ever observed
    /// partially updated.
    fn list(&self) -> Vec<Job>;

    /// Atomically transition QUEUED → RUNNING. Exactly one concurrent
    /// caller per id succeeds; the rest observe
    /// [`StoreError::AlreadyClaimed`].
    fn try_claim(&self, id: &str) -> Result<Job, StoreError>;

    /// Record one finished attempt: increments `attempts`, stores the
    /// error message on failure, and applies the retry policy's transition
    /// (terminal success, terminal failure, or requeue). Fails with
    /// [`StoreError::InvalidState`] unless the job is currently RUNNING.
    fn complete_attempt(&self, id: &str, outcome: &Outcome) -> Result<Job, StoreError>;

    /// Wake signal pulsed whenever a job becomes claimable (new submission
    /// or requeue). Idle workers park on it instead of busy-spinning.
    fn queue_events(&self) -> Arc<Notify>;
}
