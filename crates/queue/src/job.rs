//! Job envelope carried through the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{JobEvent, JobState, RetryPolicy, TransitionError};

/// A unit of work plus the bookkeeping the dispatcher needs to retry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job<P> {
    /// Stable across retries of the same job.
    pub id: Uuid,
    pub payload: P,
    /// 1-based number of the attempt this delivery represents.
    pub attempt: u32,
    pub state: JobState,
    /// When the job was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Error message from the previous attempt, if any.
    pub last_error: Option<String>,
}

impl<P> Job<P> {
    pub fn new(payload: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            attempt: 1,
            state: JobState::Pending,
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn apply(&mut self, event: JobEvent, policy: &RetryPolicy) -> Result<JobState, TransitionError> {
        self.state = self.state.transition(event, policy)?;
        Ok(self.state)
    }

    /// Turn a retryable failure back into a pending delivery for the next attempt.
    pub fn into_retry(mut self, error: String, policy: &RetryPolicy) -> Result<Self, TransitionError> {
        self.apply(JobEvent::Requeue, policy)?;
        self.attempt += 1;
        self.last_error = Some(error);
        Ok(self)
    }
}

/// What the exhaustion hook gets to see about a job that ran out of attempts.
#[derive(Debug, Clone, Serialize)]
pub struct ExhaustedJob<P> {
    pub job_id: Uuid,
    pub payload: P,
    pub attempts: u32,
    pub error: String,
    pub enqueued_at: DateTime<Utc>,
}
