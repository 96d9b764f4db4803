//! Queue backend trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::job::Job;

/// Storage for pending jobs.
///
/// Implementations own delivery mechanics (ordering, delayed visibility,
/// durability). Retry decisions are not theirs to make; the dispatcher
/// pushes a job back with a delay when it wants another attempt.
#[async_trait]
pub trait JobQueue<P>: Send + Sync
where
    P: Send + 'static,
{
    /// Enqueue a job that becomes visible after `delay`.
    async fn push(&self, job: Job<P>, delay: Duration) -> Result<(), QueueError>;

    /// Take the next visible job, or `None` if nothing is ready yet.
    async fn pop(&self) -> Result<Option<Job<P>>, QueueError>;

    /// Number of jobs held, including ones not yet visible.
    async fn len(&self) -> Result<usize, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}
