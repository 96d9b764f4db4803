//! Job queue, retry state machine and dispatcher.
//!
//! - [`Job`] envelope with attempt bookkeeping
//! - [`JobState`] lifecycle and [`RetryPolicy`]
//! - [`JobQueue`] backend trait with an in-process [`MemoryQueue`]
//! - [`Dispatcher`] running [`JobHandler`]s on a fixed worker pool and
//!   firing an [`ExhaustionHook`] when a job runs out of attempts

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod memory;
pub mod state;

pub use backend::JobQueue;
pub use dispatcher::{AttemptReport, DispatchSummary, Dispatcher, ExhaustionHook, JobHandler};
pub use error::QueueError;
pub use job::{ExhaustedJob, Job};
pub use memory::MemoryQueue;
pub use state::{JobEvent, JobState, RetryPolicy, TransitionError, DEFAULT_MAX_ATTEMPTS};
