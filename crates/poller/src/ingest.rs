//! Event ingestion.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use feedpoll_core::{Feature, Publisher, PublisherId};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("event store error: {0}")]
    Backend(String),
}

/// Persists features as events and reports how many were new.
///
/// Deduplication is the implementation's concern; callers only use the
/// count to decide whether pagination continues.
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, features: &[Feature], publisher: &Publisher) -> Result<usize, IngestError>;
}

#[derive(Default)]
struct Events {
    seen: HashSet<(PublisherId, String)>,
    stored: Vec<(PublisherId, Feature)>,
}

/// Keeps events in memory, deduplicated per publisher on [`Feature::key`].
#[derive(Default)]
pub struct MemoryIngestor {
    events: Mutex<Events>,
}

impl MemoryIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event_count(&self) -> usize {
        self.events.lock().await.stored.len()
    }

    pub async fn events_for(&self, publisher_id: PublisherId) -> Vec<Feature> {
        self.events
            .lock()
            .await
            .stored
            .iter()
            .filter(|(id, _)| *id == publisher_id)
            .map(|(_, f)| f.clone())
            .collect()
    }
}

#[async_trait]
impl Ingestor for MemoryIngestor {
    async fn ingest(&self, features: &[Feature], publisher: &Publisher) -> Result<usize, IngestError> {
        let mut events = self.events.lock().await;
        let mut created = 0;
        for feature in features {
            if events.seen.insert((publisher.id, feature.key())) {
                events.stored.push((publisher.id, feature.clone()));
                created += 1;
            }
        }
        tracing::debug!(
            publisher_id = %publisher.id,
            received = features.len(),
            created,
            "features ingested"
        );
        Ok(created)
    }
}
