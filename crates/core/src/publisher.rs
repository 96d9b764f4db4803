use serde::{Deserialize, Serialize};

/// Opaque publisher identifier, as assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublisherId(pub i64);

impl std::fmt::Display for PublisherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PublisherId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A third-party feed source.
///
/// Publishers are owned by the persistence layer; a poll job only ever holds
/// a read-only copy for the duration of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub id: PublisherId,
    /// Feed URL for the first page.
    pub endpoint: String,
    /// Contact address for endpoint failure notifications.
    pub email: String,
    pub description: String,
}

impl Publisher {
    /// Tag used to scope HTTP requests for tracing, e.g. `request.publisher.42`.
    pub fn request_tag(&self) -> String {
        request_tag(self.id)
    }
}

pub fn request_tag(id: PublisherId) -> String {
    format!("request.publisher.{}", id)
}
