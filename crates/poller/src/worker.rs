//! The publisher poll job: fetch a page, ingest it, decide on the next page.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use feedpoll_queue::JobHandler;

use crate::error::PollError;
use crate::fetcher::Fetcher;
use crate::ingest::Ingestor;
use crate::job::PollJob;
use crate::paginator::{self, NextPage, MAX_PAGE_NUMBER};

/// What one successful poll of a page produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub features: usize,
    pub new_events: usize,
    pub next: Option<NextPage>,
}

pub struct PublisherPoll {
    fetcher: Fetcher,
    ingestor: Arc<dyn Ingestor>,
}

impl PublisherPoll {
    pub fn new(fetcher: Fetcher, ingestor: Arc<dyn Ingestor>) -> Self {
        Self { fetcher, ingestor }
    }

    /// Fetch → ingest → paginate. Any error aborts the attempt unchanged.
    ///
    /// Jobs outside pages `1..=MAX_PAGE_NUMBER` are dropped without a fetch.
    pub async fn poll(&self, job: &PollJob) -> Result<PollOutcome, PollError> {
        if !(1..=MAX_PAGE_NUMBER).contains(&job.page_number) {
            warn!(
                publisher_id = %job.publisher_id,
                page = job.page_number,
                url = %job.url,
                "page number out of range, skipping"
            );
            return Ok(PollOutcome::default());
        }

        let (publisher, page) = self
            .fetcher
            .fetch(job.publisher_id, &job.url, job.page_number)
            .await?;

        let new_events = self.ingestor.ingest(&page.features, &publisher).await?;

        let next = paginator::next_page(new_events, page.next_page(), &job.url, job.page_number);
        if next.is_none() {
            if let Some(header) = page.next_page() {
                debug!(
                    publisher_id = %job.publisher_id,
                    page = job.page_number,
                    next_page = header,
                    new_events,
                    "not following next page"
                );
            }
        }

        info!(
            publisher_id = %job.publisher_id,
            page = job.page_number,
            features = page.features.len(),
            new_events,
            has_next = next.is_some(),
            "publisher polled"
        );

        Ok(PollOutcome {
            features: page.features.len(),
            new_events,
            next,
        })
    }
}

#[async_trait]
impl JobHandler for PublisherPoll {
    type Payload = PollJob;
    type Error = PollError;

    async fn perform(&self, job: &PollJob) -> Result<Vec<PollJob>, PollError> {
        let outcome = self.poll(job).await?;
        Ok(outcome
            .next
            .map(|next| PollJob::page(job.publisher_id, next.url, next.page_number))
            .into_iter()
            .collect())
    }

    fn name(&self) -> &str {
        "publisher-poll"
    }
}
