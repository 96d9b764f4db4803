//! Best-effort delivery across notification channels.
//!
//! Every channel is tried in order. Failures are logged and reported in the
//! returned results, never propagated: a notification that cannot be sent
//! must not turn into an error for whatever triggered it.

use crate::traits::{DispatchResult, Notification, Notifier};

pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Send `notification` through every channel.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::debug!(recipient = %notification.recipient, "No notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.channel_name(),
                        recipient = %notification.recipient,
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::error!(
                        channel = channel.channel_name(),
                        recipient = %notification.recipient,
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                recipient: notification.recipient.clone(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}
