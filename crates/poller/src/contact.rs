//! Exhaustion hook that emails the publisher's contact.
//!
//! The publisher is looked up again when the hook fires rather than taken
//! from the failed attempt: the attempt may have failed before the lookup
//! completed. If the publisher cannot be resolved no email is sent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use feedpoll_core::config::SmtpConfig;
use feedpoll_core::ConfigError;
use feedpoll_notify::{
    Dispatcher, EmailNotifier, FailureContext, JobContext, Notifier, PublisherContext,
    TemplateRenderer,
};
use feedpoll_queue::{ExhaustedJob, ExhaustionHook};

use crate::job::PollJob;
use crate::store::PublisherStore;

enum Delivery {
    Channels(Dispatcher),
    /// Mail transport could not be configured; reported on each exhaustion.
    Unconfigured(String),
}

pub struct PublisherContactHook {
    store: Arc<dyn PublisherStore>,
    renderer: TemplateRenderer,
    delivery: Delivery,
}

impl PublisherContactHook {
    pub fn new(store: Arc<dyn PublisherStore>, channels: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            store,
            renderer: TemplateRenderer::new(),
            delivery: Delivery::Channels(Dispatcher::new(channels)),
        }
    }

    /// Email through SMTP when `smtp` is available. A missing or invalid
    /// configuration does not stop the worker; it is logged every time a
    /// notification would have been sent.
    pub fn from_smtp(store: Arc<dyn PublisherStore>, smtp: Result<SmtpConfig, ConfigError>) -> Self {
        let email = smtp
            .map_err(|e| e.to_string())
            .and_then(|cfg| EmailNotifier::from_config(&cfg).map_err(|e| e.to_string()));
        match email {
            Ok(notifier) => {
                let channels: Vec<Box<dyn Notifier>> = vec![Box::new(notifier)];
                Self::new(store, channels)
            }
            Err(reason) => {
                warn!(reason = %reason, "publisher notifications unavailable");
                Self {
                    store,
                    renderer: TemplateRenderer::new(),
                    delivery: Delivery::Unconfigured(reason),
                }
            }
        }
    }

    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }
}

#[async_trait]
impl ExhaustionHook<PollJob> for PublisherContactHook {
    async fn on_exhausted(&self, job: &ExhaustedJob<PollJob>) {
        let publisher_id = job.payload.publisher_id;

        let dispatcher = match &self.delivery {
            Delivery::Channels(d) => d,
            Delivery::Unconfigured(reason) => {
                error!(
                    publisher_id = %publisher_id,
                    reason = %reason,
                    "cannot notify publisher contact: mail transport not configured"
                );
                return;
            }
        };

        let publisher = match self.store.get(publisher_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!(publisher_id = %publisher_id, "publisher not found, skipping failure notification");
                return;
            }
            Err(e) => {
                error!(publisher_id = %publisher_id, error = %e, "publisher lookup failed, skipping failure notification");
                return;
            }
        };

        let ctx = FailureContext {
            publisher: PublisherContext {
                id: publisher.id.to_string(),
                description: publisher.description.clone(),
                endpoint: publisher.endpoint.clone(),
                email: publisher.email.clone(),
            },
            job: JobContext {
                url: job.payload.url.clone(),
                page_number: job.payload.page_number,
                attempts: job.attempts,
                error: job.error.clone(),
            },
            now: Utc::now().to_rfc3339(),
        };

        let notification = match self.renderer.notification(&ctx) {
            Ok(n) => n,
            Err(e) => {
                error!(publisher_id = %publisher_id, error = %e, "failed to render failure notification");
                return;
            }
        };

        let results = dispatcher.dispatch(&notification).await;
        let delivered = results.iter().filter(|r| r.success).count();
        info!(
            publisher_id = %publisher_id,
            recipient = %notification.recipient,
            delivered,
            failed = results.len() - delivered,
            "publisher contact notified"
        );
    }
}
