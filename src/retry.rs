//! Retry decision rule.

use crate::store::{JobStatus, Outcome};

/// Decide the next status after a finished attempt.
///
/// Success is terminal regardless of budget left; failure is terminal once
/// the attempt ceiling is reached; otherwise the job goes straight back to
/// the queue, with no backoff delay, eligible for immediate re-claim.
pub fn decide(attempts: u32, max_attempts: u32, outcome: &Outcome) -> JobStatus {
    if outcome.succeeded {
        JobStatus::Succeeded
    } else if attempts >= max_attempts {
        JobStatus::Failed
    } else {
        JobStatus::Queued
    }
}
