//! Job lifecycle state machine and retry policy.
//!
//! ```text
//! Pending ──start──▶ Running ──succeed──▶ Succeeded
//!    ▲                  │
//!    │               fail(attempt)
//!    │                  ├── attempt < max ──▶ FailedRetryable ──requeue──┐
//!    └──────────────────┼────────────────────────────────────────────────┘
//!                       └── attempt >= max ─▶ FailedExhausted
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use feedpoll_core::config::RetryConfig;

/// Total attempts a job gets before it is exhausted.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    FailedRetryable,
    FailedExhausted,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::FailedRetryable => write!(f, "failed_retryable"),
            JobState::FailedExhausted => write!(f, "failed_exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Start,
    Succeed,
    /// The given 1-based attempt raised an error.
    Fail { attempt: u32 },
    Requeue,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid job transition: {event:?} while {from}")]
pub struct TransitionError {
    pub from: JobState,
    pub event: JobEvent,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::FailedExhausted)
    }

    pub fn transition(self, event: JobEvent, policy: &RetryPolicy) -> Result<JobState, TransitionError> {
        let next = match (self, event) {
            (JobState::Pending, JobEvent::Start) => JobState::Running,
            (JobState::Running, JobEvent::Succeed) => JobState::Succeeded,
            (JobState::Running, JobEvent::Fail { attempt }) => {
                if policy.should_retry(attempt) {
                    JobState::FailedRetryable
                } else {
                    JobState::FailedExhausted
                }
            }
            (JobState::FailedRetryable, JobEvent::Requeue) => JobState::Pending,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }
}

/// Bounded attempts with capped exponential backoff between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff,
            max_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Retries are re-enqueued with no delay.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Whether a failure on `attempt` (1-based) leaves attempts to spare.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`: `base * 2^(attempt-1)`,
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let policy = RetryPolicy::default();
        let running = JobState::Pending.transition(JobEvent::Start, &policy).unwrap();
        assert_eq!(running, JobState::Running);
        let done = running.transition(JobEvent::Succeed, &policy).unwrap();
        assert_eq!(done, JobState::Succeeded);
        assert!(done.is_terminal());
    }

    #[test]
    fn failures_below_ceiling_are_retryable() {
        let policy = RetryPolicy::default();
        for attempt in 1..DEFAULT_MAX_ATTEMPTS {
            let state = JobState::Running
                .transition(JobEvent::Fail { attempt }, &policy)
                .unwrap();
            assert_eq!(state, JobState::FailedRetryable, "attempt {attempt}");
            assert_eq!(
                state.transition(JobEvent::Requeue, &policy).unwrap(),
                JobState::Pending
            );
        }
    }

    #[test]
    fn fifth_failure_exhausts() {
        let policy = RetryPolicy::default();
        let state = JobState::Running
            .transition(JobEvent::Fail { attempt: 5 }, &policy)
            .unwrap();
        assert_eq!(state, JobState::FailedExhausted);
        assert!(state.is_terminal());
    }

    #[test]
    fn terminal_states_reject_events() {
        let policy = RetryPolicy::default();
        let err = JobState::FailedExhausted
            .transition(JobEvent::Requeue, &policy)
            .unwrap_err();
        assert_eq!(err.from, JobState::FailedExhausted);
        assert!(JobState::Succeeded.transition(JobEvent::Start, &policy).is_err());
        assert!(JobState::Pending.transition(JobEvent::Succeed, &policy).is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn from_config_keeps_fixed_ceiling() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            base_backoff_ms: 10,
            max_backoff_ms: 20,
        });
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_backoff, Duration::from_millis(10));
    }
}
