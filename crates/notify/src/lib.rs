//! Endpoint failure notifications.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - SMTP email notifier built from an explicit `SmtpConfig`
//! - Minijinja template rendering for notification messages
//! - Best-effort dispatcher that logs and swallows delivery failures

pub mod dispatcher;
pub mod email;
pub mod templating;
pub mod traits;

pub use dispatcher::Dispatcher;
pub use email::EmailNotifier;
pub use templating::{FailureContext, JobContext, PublisherContext, TemplateRenderer};
pub use traits::{DispatchResult, Notification, Notifier, NotifyError};
