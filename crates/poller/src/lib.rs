//! Publisher feed polling.
//!
//! One [`PollJob`] fetches a single feed page, hands its features to an
//! [`Ingestor`], and, when the page produced new events and links to a
//! same-host next page, yields the job for that page. Retries, exhaustion
//! and enqueueing are left to the `feedpoll-queue` dispatcher; on
//! exhaustion [`PublisherContactHook`] emails the publisher's contact.

pub mod contact;
pub mod error;
pub mod fetcher;
pub mod ingest;
pub mod job;
pub mod paginator;
pub mod store;
pub mod worker;

pub use contact::PublisherContactHook;
pub use error::PollError;
pub use fetcher::{FeedSource, FetchError, FetchedPage, Fetcher, HttpFeedSource};
pub use ingest::{IngestError, Ingestor, MemoryIngestor};
pub use job::PollJob;
pub use paginator::{next_page, NextPage, MAX_PAGE_NUMBER, NEXT_PAGE_HEADER};
pub use store::{MemoryPublisherStore, PublisherStore, StoreError};
pub use worker::{PollOutcome, PublisherPoll};
