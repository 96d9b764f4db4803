//! Publisher resolution and page retrieval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use thiserror::Error;
use tracing::Instrument;

use feedpoll_core::config::HttpConfig;
use feedpoll_core::{request_tag, Feature, FeatureCollection, Publisher, PublisherId};

use crate::error::PollError;
use crate::paginator::NEXT_PAGE_HEADER;
use crate::store::PublisherStore;

/// Header carrying the per-publisher request tag.
pub const REQUEST_TAG_HEADER: &str = "X-Request-Tag";

/// Longest response body excerpt kept in a status error.
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("malformed feed body: {0}")]
    Decode(String),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// One decoded feed page.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub features: Vec<Feature>,
    pub headers: HeaderMap,
}

impl FetchedPage {
    /// Value of the `Next-Page` header, if present and valid UTF-8.
    pub fn next_page(&self) -> Option<&str> {
        self.headers
            .get(NEXT_PAGE_HEADER)
            .and_then(|v| v.to_str().ok())
    }
}

/// Performs a single GET of a feed page.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn get_page(&self, url: &str, request_tag: &str) -> Result<FetchedPage, FetchError>;
}

/// [`FeedSource`] over HTTP via `reqwest`.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn get_page(&self, url: &str, request_tag: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(REQUEST_TAG_HEADER, request_tag)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;
        let collection: FeatureCollection =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(FetchedPage {
            features: collection.features,
            headers,
        })
    }
}

/// Resolves the publisher, then fetches the page under its request tag.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<dyn PublisherStore>,
    source: Arc<dyn FeedSource>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn PublisherStore>, source: Arc<dyn FeedSource>) -> Self {
        Self { store, source }
    }

    pub async fn fetch(
        &self,
        publisher_id: PublisherId,
        url: &str,
        page_number: u32,
    ) -> Result<(Publisher, FetchedPage), PollError> {
        let publisher = self
            .store
            .get(publisher_id)
            .await?
            .ok_or(PollError::NotFound(publisher_id))?;

        let tag = request_tag(publisher.id);
        let span = tracing::info_span!("fetch", request = %tag, url = %url, page = page_number);

        async move {
            let started = std::time::Instant::now();
            let page = self.source.get_page(url, &tag).await?;
            tracing::debug!(
                features = page.features.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "page fetched"
            );
            Ok::<_, PollError>((publisher, page))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn source() -> HttpFeedSource {
        HttpFeedSource::new(&HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn decodes_features_and_next_page_header() {
        let base = serve(Router::new().route(
            "/feed",
            get(|| async {
                (
                    [("Next-Page", "http://127.0.0.1/feed?page=2")],
                    Json(json!({
                        "type": "FeatureCollection",
                        "features": [{"id": "a"}, {"id": "b"}, {"id": "c"}]
                    })),
                )
            }),
        ))
        .await;

        let page = source()
            .get_page(&format!("{base}/feed"), "request.publisher.42")
            .await
            .unwrap();
        assert_eq!(page.features.len(), 3);
        assert_eq!(page.next_page(), Some("http://127.0.0.1/feed?page=2"));
    }

    #[tokio::test]
    async fn sends_request_tag() {
        let base = serve(Router::new().route(
            "/feed",
            get(|headers: axum::http::HeaderMap| async move {
                let tag = headers
                    .get(REQUEST_TAG_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "features": [{ "id": tag }] }))
            }),
        ))
        .await;

        let page = source()
            .get_page(&format!("{base}/feed"), "request.publisher.7")
            .await
            .unwrap();
        assert_eq!(page.features[0].id().as_deref(), Some("request.publisher.7"));
    }

    #[tokio::test]
    async fn non_2xx_is_a_status_error() {
        let base = serve(Router::new().route(
            "/feed",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        ))
        .await;

        let err = source().get_page(&format!("{base}/feed"), "t").await.unwrap_err();
        match err {
            FetchError::Status { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn body_without_features_is_a_decode_error() {
        let base = serve(Router::new().route(
            "/feed",
            get(|| async { Json(json!({ "type": "FeatureCollection" })) }),
        ))
        .await;

        let err = source().get_page(&format!("{base}/feed"), "t").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let base = serve(Router::new().route(
            "/feed",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "features": [] }))
            }),
        ))
        .await;

        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let err = HttpFeedSource::from_client(client)
            .get_page(&format!("{base}/feed"), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unknown_publisher_is_not_found() {
        let store = Arc::new(crate::store::MemoryPublisherStore::new());
        let fetcher = Fetcher::new(store, Arc::new(source()));

        let err = fetcher
            .fetch(PublisherId(99), "http://127.0.0.1:1/feed", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::NotFound(PublisherId(99))), "got {err:?}");
    }
}
