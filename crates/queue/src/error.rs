//! Queue error types.

use thiserror::Error;

use crate::state::TransitionError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("enqueue error: {0}")]
    Enqueue(String),

    #[error("dequeue error: {0}")]
    Dequeue(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
