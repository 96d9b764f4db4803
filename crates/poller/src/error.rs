use thiserror::Error;

use feedpoll_core::PublisherId;

use crate::fetcher::FetchError;
use crate::ingest::IngestError;
use crate::store::StoreError;

/// Anything that fails a poll attempt. Every variant consumes a retry.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("publisher not found: {0}")]
    NotFound(PublisherId),

    #[error("publisher lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("ingest failed: {0}")]
    Ingest(#[from] IngestError),
}
