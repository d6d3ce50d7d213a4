//! Worker pool that drives queued jobs to their terminal status.
//!
//! Each worker runs an independent claim/execute/complete loop against the
//! shared [`JobStore`]. Losing a claim race is routine, never an error:
//! another worker won, and this one moves to the next candidate.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::simulator::simulate;
use crate::store::{Job, JobStatus, JobStore, StoreError};

/// Tuning knobs for the worker pool.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Fallback wake-up interval for idle workers.
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A fixed-size pool of workers sharing one [`JobStore`].
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    config: DispatcherConfig,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn JobStore>, config: DispatcherConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the worker tasks. They run until [`Dispatcher::shutdown`].
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        (0..self.config.workers)
            .map(|worker_id| {
                let store = Arc::clone(&self.store);
                let cancel = self.cancel.clone();
                let poll_interval = self.config.poll_interval;
                tokio::spawn(async move {
                    worker_loop(worker_id, store, cancel, poll_interval).await;
                })
            })
            .collect()
    }

    /// Signal every worker to stop after its current iteration.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn worker_loop(
    worker_id: usize,
    store: Arc<dyn JobStore>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    debug!(worker_id, "worker started");
    let wake = store.queue_events();

    loop {
        // Arm the wake signal before scanning so a submission landing
        // between the scan and the park is not missed.
        let notified = wake.notified();

        match claim_next(store.as_ref()) {
            Some(job) => run_attempt(worker_id, store.as_ref(), &job),
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = notified => {}
                    _ = sleep(poll_interval) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            break;
        }
    }
    debug!(worker_id, "worker stopped");
}

/// Scan for QUEUED jobs, oldest `created_at` first with ties broken by id,
/// and claim the first one still available.
fn claim_next(store: &dyn JobStore) -> Option<Job> {
    let mut candidates: Vec<Job> = store
        .list()
        .into_iter()
        .filter(|job| job.status == JobStatus::Queued)
        .collect();
    candidates.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    for candidate in candidates {
        match store.try_claim(&candidate.id) {
            Ok(job) => return Some(job),
            // Another worker won the race, or the record vanished.
            Err(StoreError::AlreadyClaimed(_)) | Err(StoreError::NotFound(_)) => continue,
            Err(err) => {
                warn!(job_id = %candidate.id, error = %err, "unexpected claim error");
                continue;
            }
        }
    }
    None
}

/// Execute one attempt of a claimed job and write the completion back.
fn run_attempt(worker_id: usize, store: &dyn JobStore, job: &Job) {
    let attempt = job.attempts + 1;
    let outcome = simulate(&job.payload, attempt);

    match store.complete_attempt(&job.id, &outcome) {
        Ok(updated) => match updated.status {
            JobStatus::Succeeded => {
                info!(
                    worker_id,
                    job_id = %updated.id,
                    attempts = updated.attempts,
                    "job succeeded"
                );
            }
            JobStatus::Failed => {
                info!(
                    worker_id,
                    job_id = %updated.id,
                    attempts = updated.attempts,
                    error = updated.last_error.as_deref().unwrap_or(""),
                    "job failed"
                );
            }
            _ => {
                debug!(worker_id, job_id = %updated.id, attempt, "attempt failed, requeued");
            }
        },
        // Protocol violation (double completion or vanished record); the
        // job is abandoned and the worker stays alive.
        Err(err) => {
            warn!(worker_id, job_id = %job.id, error = %err, "completion rejected");
        }
    }
}
