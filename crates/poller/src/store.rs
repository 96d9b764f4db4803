//! Publisher lookup.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use feedpoll_core::{Publisher, PublisherId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("failed to load publishers from {path}: {reason}")]
    Load { path: String, reason: String },
}

/// Read access to publisher records owned by the persistence layer.
#[async_trait]
pub trait PublisherStore: Send + Sync {
    async fn get(&self, id: PublisherId) -> Result<Option<Publisher>, StoreError>;

    async fn all(&self) -> Result<Vec<Publisher>, StoreError>;
}

/// In-process publisher table.
#[derive(Default)]
pub struct MemoryPublisherStore {
    publishers: RwLock<BTreeMap<PublisherId, Publisher>>,
}

impl MemoryPublisherStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publishers(publishers: impl IntoIterator<Item = Publisher>) -> Self {
        Self {
            publishers: RwLock::new(publishers.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Load a JSON array of publishers.
    pub async fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let load_err = |reason: String| StoreError::Load {
            path: path.display().to_string(),
            reason,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(e.to_string()))?;
        let publishers: Vec<Publisher> =
            serde_json::from_str(&raw).map_err(|e| load_err(e.to_string()))?;
        tracing::info!(path = %path.display(), count = publishers.len(), "publishers loaded");
        Ok(Self::with_publishers(publishers))
    }

    pub async fn insert(&self, publisher: Publisher) {
        self.publishers.write().await.insert(publisher.id, publisher);
    }

    pub async fn remove(&self, id: PublisherId) -> Option<Publisher> {
        self.publishers.write().await.remove(&id)
    }
}

#[async_trait]
impl PublisherStore for MemoryPublisherStore {
    async fn get(&self, id: PublisherId) -> Result<Option<Publisher>, StoreError> {
        Ok(self.publishers.read().await.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<Publisher>, StoreError> {
        Ok(self.publishers.read().await.values().cloned().collect())
    }
}
