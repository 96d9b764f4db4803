//! In-process delayed queue.
//!
//! Jobs are kept in a min-heap keyed on the instant they become visible,
//! with an insertion sequence number to keep FIFO order among jobs that
//! become visible at the same time. Uses tokio's clock, so tests running
//! with paused time see delays elapse instantly.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::backend::JobQueue;
use crate::error::QueueError;
use crate::job::Job;

struct Entry<P> {
    ready_at: Instant,
    seq: u64,
    job: Job<P>,
}

impl<P> PartialEq for Entry<P> {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl<P> Eq for Entry<P> {}

impl<P> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for Entry<P> {
    // Reversed so the max-heap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner<P> {
    heap: BinaryHeap<Entry<P>>,
    next_seq: u64,
}

pub struct MemoryQueue<P> {
    inner: Mutex<Inner<P>>,
}

impl<P> MemoryQueue<P> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Time until the earliest held job becomes visible (zero if one is ready).
    pub async fn next_ready_in(&self) -> Option<Duration> {
        let inner = self.inner.lock().await;
        inner
            .heap
            .peek()
            .map(|e| e.ready_at.saturating_duration_since(Instant::now()))
    }
}

impl<P> Default for MemoryQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P> JobQueue<P> for MemoryQueue<P>
where
    P: Send + 'static,
{
    async fn push(&self, job: Job<P>, delay: Duration) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        debug!(job_id = %job.id, attempt = job.attempt, delay_ms = delay.as_millis() as u64, "job enqueued");
        inner.heap.push(Entry {
            ready_at: Instant::now() + delay,
            seq,
            job,
        });
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Job<P>>, QueueError> {
        let mut inner = self.inner.lock().await;
        let ready = inner
            .heap
            .peek()
            .is_some_and(|e| e.ready_at <= Instant::now());
        if !ready {
            return Ok(None);
        }
        Ok(inner.heap.pop().map(|e| e.job))
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.inner.lock().await.heap.len())
    }
}
