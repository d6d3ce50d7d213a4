use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Tracks the lifecycle status of a job.
///
/// Serialized as the four-symbol enumeration `QUEUED | RUNNING |
/// SUCCEEDED | FAILED` that external clients consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// `Succeeded` and `Failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// The result of executing one job attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub succeeded: bool,
    pub error: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error: Some(message.into()),
        }
    }
}

/// A single unit of work in the retrylab queue.
///
/// Mutated only through the store's atomic operations; `attempts` counts
/// every execution attempt, including the one that produces a terminal
/// result, and never exceeds `max_attempts`. `last_error` keeps the
/// message of the most recent failed attempt and is never cleared, even
/// after a later success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: Value,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: String, payload: Value, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            payload,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
