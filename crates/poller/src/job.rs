use serde::{Deserialize, Serialize};

use feedpoll_core::{Publisher, PublisherId};

fn first_page() -> u32 {
    1
}

/// Arguments of one publisher poll: fetch `url` as page `page_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollJob {
    pub publisher_id: PublisherId,
    pub url: String,
    /// 1-based.
    #[serde(default = "first_page")]
    pub page_number: u32,
}

impl PollJob {
    /// First page of a feed.
    pub fn new(publisher_id: PublisherId, url: impl Into<String>) -> Self {
        Self::page(publisher_id, url, first_page())
    }

    pub fn page(publisher_id: PublisherId, url: impl Into<String>, page_number: u32) -> Self {
        Self {
            publisher_id,
            url: url.into(),
            page_number,
        }
    }

    /// First page of the publisher's configured endpoint.
    pub fn for_publisher(publisher: &Publisher) -> Self {
        Self::new(publisher.id, publisher.endpoint.clone())
    }
}
