use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Notify, watch};

use super::{Job, JobStatus, JobStore, Outcome, StoreError};
use crate::retry;

/// In-process [`JobStore`] backed by a mutex-guarded map.
///
/// Claim and completion are compare-and-transition under one coarse lock.
/// The lock only covers the field updates themselves, so unrelated jobs
/// never wait on each other's execution.
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    queue_events: Arc<Notify>,
}

struct Inner {
    jobs: HashMap<String, Job>,
    /// Ids in creation order; backs the stable `list` ordering.
    order: Vec<String>,
    /// Per-job transition observers, created lazily by `subscribe`.
    watchers: HashMap<String, watch::Sender<Job>>,
}

impl Inner {
    fn publish(&self, job: &Job) {
        if let Some(tx) = self.watchers.get(&job.id) {
            // A send only fails when every receiver is gone; stale
            // watchers are harmless.
            let _ = tx.send(job.clone());
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                order: Vec::new(),
                watchers: HashMap::new(),
            }),
            queue_events: Arc::new(Notify::new()),
        }
    }

    /// Observe every committed transition of one job.
    ///
    /// The receiver starts at the job's current snapshot. This is an
    /// optional capability for push-based clients; the engine itself only
    /// ever polls.
    pub fn subscribe(&self, id: &str) -> Result<watch::Receiver<Job>, StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let rx = match inner.watchers.get(id) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = watch::channel(job);
                inner.watchers.insert(id.to_string(), tx);
                rx
            }
        };
        Ok(rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("job store mutex poisoned")
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryStore {
    fn create(&self, job_type: &str, payload: Value, max_attempts: u32) -> Result<Job, StoreError> {
        if max_attempts < 1 {
            return Err(StoreError::InvalidArgument(format!(
                "max_attempts must be at least 1, got {max_attempts}"
            )));
        }
        if job_type.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "type must not be empty".to_string(),
            ));
        }

        let job = Job::new(job_type.to_string(), payload, max_attempts);
        {
            let mut inner = self.lock();
            inner.order.push(job.id.clone());
            inner.jobs.insert(job.id.clone(), job.clone());
        }
        self.queue_events.notify_one();
        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Job, StoreError> {
        self.lock()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list(&self) -> Vec<Job> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect()
    }

    fn try_claim(&self, id: &str) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if job.status != JobStatus::Queued {
            return Err(StoreError::AlreadyClaimed(id.to_string()));
        }
        job.status = JobStatus::Running;
        job.updated_at = Utc::now();

        let snapshot = job.clone();
        inner.publish(&snapshot);
        Ok(snapshot)
    }

    fn complete_attempt(&self, id: &str, outcome: &Outcome) -> Result<Job, StoreError> {
        let (snapshot, requeued) = {
            let mut inner = self.lock();
            let job = inner
                .jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

            if job.status != JobStatus::Running {
                return Err(StoreError::InvalidState {
                    id: id.to_string(),
                    status: job.status,
                });
            }

            job.attempts += 1;
            if !outcome.succeeded
                && let Some(message) = &outcome.error
            {
                job.last_error = Some(message.clone());
            }
            job.status = retry::decide(job.attempts, job.max_attempts, outcome);
            job.updated_at = Utc::now();

            let snapshot = job.clone();
            let requeued = snapshot.status == JobStatus::Queued;
            inner.publish(&snapshot);
            (snapshot, requeued)
        };

        if requeued {
            self.queue_events.notify_one();
        }
        Ok(snapshot)
    }

    fn queue_events(&self) -> Arc<Notify> {
        Arc::clone(&self.queue_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Barrier;
    use std::thread;

    fn store_with_job(max_attempts: u32) -> (InMemoryStore, String) {
        let store = InMemoryStore::new();
        let job = store.create("send-email", json!({}), max_attempts).unwrap();
        (store, job.id)
    }

    #[test]
    fn create_rejects_zero_max_attempts() {
        let store = InMemoryStore::new();
        let err = store.create("send-email", json!({}), 0).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(store.list().is_empty());
    }

    #[test]
    fn create_rejects_empty_type() {
        let store = InMemoryStore::new();
        let err = store.create("  ", json!({}), 3).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn create_is_immediately_visible() {
        let (store, id) = store_with_job(3);
        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn list_preserves_creation_order_and_is_idempotent() {
        let store = InMemoryStore::new();
        let first = store.create("a", json!({}), 1).unwrap();
        let second = store.create("b", json!({}), 1).unwrap();
        let third = store.create("c", json!({}), 1).unwrap();

        let listed: Vec<String> = store.list().into_iter().map(|j| j.id).collect();
        assert_eq!(listed, vec![first.id, second.id, third.id]);

        let again: Vec<String> = store.list().into_iter().map(|j| j.id).collect();
        assert_eq!(listed, again);
    }

    #[test]
    fn claim_transitions_queued_to_running() {
        let (store, id) = store_with_job(3);
        let claimed = store.try_claim(&id).unwrap();
        assert_eq!(claimed.status, JobStatus::Running);

        let err = store.try_claim(&id).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClaimed(_)));
    }

    #[test]
    fn claim_unknown_id_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.try_claim("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let (store, id) = store_with_job(3);
        let store = Arc::new(store);
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.try_claim(&id).is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn complete_requires_running() {
        let (store, id) = store_with_job(3);
        let err = store.complete_attempt(&id, &Outcome::success()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));
    }

    #[test]
    fn double_completion_is_rejected() {
        let (store, id) = store_with_job(1);
        store.try_claim(&id).unwrap();
        store.complete_attempt(&id, &Outcome::success()).unwrap();

        let err = store.complete_attempt(&id, &Outcome::success()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidState {
                status: JobStatus::Succeeded,
                ..
            }
        ));
    }

    #[test]
    fn successful_attempt_is_terminal() {
        let (store, id) = store_with_job(3);
        store.try_claim(&id).unwrap();
        let job = store.complete_attempt(&id, &Outcome::success()).unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.attempts, 1);

        // Terminal finality: the job can never be claimed again.
        let err = store.try_claim(&id).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClaimed(_)));
    }

    #[test]
    fn failed_attempts_requeue_until_ceiling() {
        let (store, id) = store_with_job(3);

        for attempt in 1..=3u32 {
            let job = store.try_claim(&id).unwrap();
            assert_eq!(job.attempts, attempt - 1);

            let job = store
                .complete_attempt(&id, &Outcome::failure(format!("attempt {attempt} failed")))
                .unwrap();
            assert_eq!(job.attempts, attempt);
            if attempt < 3 {
                assert_eq!(job.status, JobStatus::Queued);
            } else {
                assert_eq!(job.status, JobStatus::Failed);
            }
        }

        let job = store.get(&id).unwrap();
        assert_eq!(job.attempts, 3);
        assert!(job.attempts <= job.max_attempts);
        assert_eq!(job.last_error.as_deref(), Some("attempt 3 failed"));
    }

    #[test]
    fn last_error_survives_later_success() {
        let (store, id) = store_with_job(3);

        store.try_claim(&id).unwrap();
        store
            .complete_attempt(&id, &Outcome::failure("transient glitch"))
            .unwrap();

        store.try_claim(&id).unwrap();
        let job = store.complete_attempt(&id, &Outcome::success()).unwrap();

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.attempts, 2);
        assert_eq!(job.last_error.as_deref(), Some("transient glitch"));
    }

    #[test]
    fn updated_at_moves_on_every_transition() {
        let (store, id) = store_with_job(2);
        let created = store.get(&id).unwrap();

        let claimed = store.try_claim(&id).unwrap();
        assert!(claimed.updated_at >= created.updated_at);

        let completed = store.complete_attempt(&id, &Outcome::failure("x")).unwrap();
        assert!(completed.updated_at >= claimed.updated_at);
        assert_eq!(completed.created_at, created.created_at);
    }

    #[tokio::test]
    async fn subscribe_observes_transitions() {
        let (store, id) = store_with_job(1);
        let mut rx = store.subscribe(&id).unwrap();
        assert_eq!(rx.borrow().status, JobStatus::Queued);

        store.try_claim(&id).unwrap();
        store.complete_attempt(&id, &Outcome::success()).unwrap();

        let job = rx
            .wait_for(|job| job.status.is_terminal())
            .await
            .unwrap()
            .clone();
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[test]
    fn subscribe_unknown_id_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.subscribe("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
