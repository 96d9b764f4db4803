//! Runs jobs from a [`JobQueue`] on a fixed worker pool and owns the
//! retry/exhaustion state machine.
//!
//! Handlers run one attempt and either fail or return follow-up payloads.
//! The dispatcher decides everything else: whether a failure is retried and
//! after what delay, when a job is exhausted, and enqueueing follow-ups.

use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::JobQueue;
use crate::error::QueueError;
use crate::job::{ExhaustedJob, Job};
use crate::state::{JobEvent, JobState, RetryPolicy};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default sleep when no job is ready.
const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(250);

/// Performs a single attempt of a job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Payload: Clone + Debug + Send + Sync + 'static;
    type Error: Display + Send + 'static;

    /// Run one attempt. On success, returns payloads for jobs to enqueue next.
    async fn perform(&self, payload: &Self::Payload) -> Result<Vec<Self::Payload>, Self::Error>;

    /// Human-readable name for logs (e.g., "publisher-poll").
    fn name(&self) -> &str;
}

/// Invoked once when a job fails its final attempt.
///
/// The signature is infallible: anything that goes wrong inside the hook
/// must be handled there and can never feed back into the retry cycle.
#[async_trait]
pub trait ExhaustionHook<P>: Send + Sync {
    async fn on_exhausted(&self, job: &ExhaustedJob<P>);
}

/// Result of running one attempt.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub job_id: Uuid,
    pub attempt: u32,
    /// `Succeeded`, `FailedRetryable` or `FailedExhausted`.
    pub state: JobState,
    /// Follow-up jobs enqueued by a successful attempt.
    pub scheduled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempts: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub exhausted: usize,
    pub scheduled: usize,
}

impl DispatchSummary {
    fn record(&mut self, report: &AttemptReport) {
        self.attempts += 1;
        match report.state {
            JobState::Succeeded => {
                self.succeeded += 1;
                self.scheduled += report.scheduled;
            }
            JobState::FailedRetryable => self.retried += 1,
            JobState::FailedExhausted => self.exhausted += 1,
            JobState::Pending | JobState::Running => {}
        }
    }
}

/// Everything a single attempt needs, cheap to clone into a worker task.
struct Executor<H: JobHandler> {
    handler: Arc<H>,
    queue: Arc<dyn JobQueue<H::Payload>>,
    hook: Arc<dyn ExhaustionHook<H::Payload>>,
    policy: RetryPolicy,
}

impl<H: JobHandler> Clone for Executor<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            queue: self.queue.clone(),
            hook: self.hook.clone(),
            policy: self.policy,
        }
    }
}

impl<H: JobHandler> Executor<H> {
    async fn execute(&self, mut job: Job<H::Payload>) -> Result<AttemptReport, QueueError> {
        let policy = self.policy;
        job.apply(JobEvent::Start, &policy)?;
        debug!(
            handler = self.handler.name(),
            job_id = %job.id,
            attempt = job.attempt,
            "job started"
        );

        let (state, scheduled) = match self.handler.perform(&job.payload).await {
            Ok(follow_ups) => {
                let state = job.apply(JobEvent::Succeed, &policy)?;
                let scheduled = self.schedule(follow_ups).await;
                info!(
                    handler = self.handler.name(),
                    job_id = %job.id,
                    attempt = job.attempt,
                    scheduled,
                    "job succeeded"
                );
                (state, scheduled)
            }
            Err(e) => {
                let message = e.to_string();
                let state = match job.apply(JobEvent::Fail { attempt: job.attempt }, &policy)? {
                    JobState::FailedRetryable => match self.retry(job.clone(), message.clone()).await {
                        Ok(()) => JobState::FailedRetryable,
                        Err(requeue) => {
                            // The job cannot come back, so this attempt is its last.
                            error!(
                                handler = self.handler.name(),
                                job_id = %job.id,
                                attempt = job.attempt,
                                error = %requeue,
                                "failed to requeue job, treating as exhausted"
                            );
                            job.state = JobState::FailedExhausted;
                            self.exhaust(&job, format!("{message} (requeue failed: {requeue})"))
                                .await;
                            JobState::FailedExhausted
                        }
                    },
                    state => {
                        self.exhaust(&job, message).await;
                        state
                    }
                };
                (state, 0)
            }
        };

        Ok(AttemptReport {
            job_id: job.id,
            attempt: job.attempt,
            state,
            scheduled,
        })
    }

    /// Follow-ups are independent jobs: an enqueue failure is logged and
    /// does not fail the attempt that produced them.
    async fn schedule(&self, follow_ups: Vec<H::Payload>) -> usize {
        let mut scheduled = 0;
        for payload in follow_ups {
            let next = Job::new(payload);
            let next_id = next.id;
            match self.queue.push(next, Duration::ZERO).await {
                Ok(()) => {
                    debug!(handler = self.handler.name(), job_id = %next_id, "follow-up job scheduled");
                    scheduled += 1;
                }
                Err(e) => {
                    warn!(
                        handler = self.handler.name(),
                        error = %e,
                        "failed to schedule follow-up job"
                    );
                }
            }
        }
        scheduled
    }

    async fn retry(&self, job: Job<H::Payload>, message: String) -> Result<(), QueueError> {
        let delay = self.policy.backoff(job.attempt);
        warn!(
            handler = self.handler.name(),
            job_id = %job.id,
            attempt = job.attempt,
            max_attempts = self.policy.max_attempts,
            backoff_ms = delay.as_millis() as u64,
            error = %message,
            "job failed, retrying"
        );
        let retry = job.into_retry(message, &self.policy)?;
        self.queue.push(retry, delay).await
    }

    async fn exhaust(&self, job: &Job<H::Payload>, message: String) {
        warn!(
            handler = self.handler.name(),
            job_id = %job.id,
            args = ?job.payload,
            attempts = job.attempt,
            error = %message,
            "job exhausted retries"
        );
        let exhausted = ExhaustedJob {
            job_id: job.id,
            payload: job.payload.clone(),
            attempts: job.attempt,
            error: message,
            enqueued_at: job.enqueued_at,
        };
        self.hook.on_exhausted(&exhausted).await;
    }
}

/// Fixed-pool job dispatcher.
pub struct Dispatcher<H: JobHandler> {
    executor: Executor<H>,
    workers: Arc<Semaphore>,
    idle_poll: Duration,
}

impl<H: JobHandler> Dispatcher<H> {
    pub fn new(
        handler: Arc<H>,
        queue: Arc<dyn JobQueue<H::Payload>>,
        hook: Arc<dyn ExhaustionHook<H::Payload>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            executor: Executor {
                handler,
                queue,
                hook,
                policy,
            },
            workers: Arc::new(Semaphore::new(DEFAULT_WORKERS)),
            idle_poll: DEFAULT_IDLE_POLL,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Enqueue a fresh job for `payload`.
    pub async fn enqueue(&self, payload: H::Payload) -> Result<Uuid, QueueError> {
        let job = Job::new(payload);
        let id = job.id;
        self.executor.queue.push(job, Duration::ZERO).await?;
        Ok(id)
    }

    /// Run a single attempt of `job` on the calling task.
    pub async fn execute(&self, job: Job<H::Payload>) -> Result<AttemptReport, QueueError> {
        self.executor.execute(job).await
    }

    /// Process jobs until the queue is empty and no attempt is in flight,
    /// including waiting out retry backoff.
    pub async fn run_until_idle(&self) -> Result<DispatchSummary, QueueError> {
        let mut tasks = JoinSet::new();
        let mut summary = DispatchSummary::default();

        loop {
            self.launch_ready(&mut tasks).await?;

            if tasks.is_empty() {
                if self.executor.queue.is_empty().await? {
                    break;
                }
                // Only delayed retries left.
                tokio::time::sleep(self.idle_poll).await;
                continue;
            }

            tokio::select! {
                Some(res) = tasks.join_next() => Self::collect(&mut summary, res),
                _ = tokio::time::sleep(self.idle_poll) => {}
            }
        }

        Ok(summary)
    }

    /// Process jobs until `shutdown` is notified, then wait for in-flight
    /// attempts to finish. Jobs still queued are left in the queue.
    ///
    /// Signal with [`Notify::notify_one`]: its permit is kept if this loop
    /// has not started waiting yet.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<DispatchSummary, QueueError> {
        let mut tasks = JoinSet::new();
        let mut summary = DispatchSummary::default();

        let shutdown_signal = shutdown.notified();
        tokio::pin!(shutdown_signal);

        info!(handler = self.executor.handler.name(), "dispatcher started");

        loop {
            self.launch_ready(&mut tasks).await?;

            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!(in_flight = tasks.len(), "shutdown requested, draining in-flight jobs");
                    break;
                }
                Some(res) = tasks.join_next(), if !tasks.is_empty() => Self::collect(&mut summary, res),
                _ = tokio::time::sleep(self.idle_poll) => {}
            }
        }

        while let Some(res) = tasks.join_next().await {
            Self::collect(&mut summary, res);
        }

        info!(
            handler = self.executor.handler.name(),
            attempts = summary.attempts,
            succeeded = summary.succeeded,
            exhausted = summary.exhausted,
            "dispatcher stopped"
        );
        Ok(summary)
    }

    /// Start as many ready jobs as there are free workers.
    async fn launch_ready(
        &self,
        tasks: &mut JoinSet<Result<AttemptReport, QueueError>>,
    ) -> Result<(), QueueError> {
        while let Ok(permit) = self.workers.clone().try_acquire_owned() {
            let Some(job) = self.executor.queue.pop().await? else {
                break;
            };
            let executor = self.executor.clone();
            tasks.spawn(async move {
                let _permit = permit;
                executor.execute(job).await
            });
        }
        Ok(())
    }

    fn collect(
        summary: &mut DispatchSummary,
        res: Result<Result<AttemptReport, QueueError>, JoinError>,
    ) {
        match res {
            Ok(Ok(report)) => summary.record(&report),
            Ok(Err(e)) => error!(error = %e, "job attempt could not be completed"),
            Err(e) => error!(error = %e, "job task panicked or was cancelled"),
        }
    }
}
