//! Minijinja template rendering for endpoint failure notifications.
//!
//! Templates are arbitrary strings (overridable at startup), so a fresh
//! [`minijinja::Environment`] is created per render call. Undefined
//! variables are errors rather than empty strings, so a typo in an
//! override surfaces instead of sending a half-empty email.

use std::collections::HashMap;

use minijinja::UndefinedBehavior;

use crate::traits::{Notification, NotifyError};

pub const DEFAULT_SUBJECT: &str = "Feed publisher - endpoint error notification";

pub const DEFAULT_BODY: &str = "Notification Error.<hr>
We have repeatedly failed to retrieve events from your endpoint. <br>
Description: {{ publisher.description|e }}. <br>
Endpoint: {{ publisher.endpoint }}.";

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailureContext {
    pub publisher: PublisherContext,
    pub job: JobContext,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

/// Publisher fields exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublisherContext {
    pub id: String,
    pub description: String,
    pub endpoint: String,
    pub email: String,
}

/// The job that ran out of attempts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobContext {
    /// Page URL of the final failed attempt.
    pub url: String,
    pub page_number: u32,
    pub attempts: u32,
    /// Error message of the final attempt.
    pub error: String,
}

/// Renders notification templates using minijinja.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    subject: String,
    body: String,
}

impl TemplateRenderer {
    /// Renderer with the default subject and HTML body.
    pub fn new() -> Self {
        Self::with_templates(DEFAULT_SUBJECT, DEFAULT_BODY)
    }

    pub fn with_templates(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Defaults, replaced by whichever templates are given. The result is
    /// validated so a broken override fails at startup.
    pub fn from_overrides(subject: Option<String>, body: Option<String>) -> Result<Self, NotifyError> {
        let renderer = Self::with_templates(
            subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
        );
        renderer.validate()?;
        Ok(renderer)
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env
    }

    /// Render a template string with the given context.
    pub fn render(&self, template_str: &str, ctx: &FailureContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Check that both templates parse. Does not evaluate them.
    pub fn validate(&self) -> Result<(), NotifyError> {
        let env = Self::build_env();
        for template in [&self.subject, &self.body] {
            env.template_from_str(template)
                .map_err(|e| NotifyError::Template(e.to_string()))?;
        }
        Ok(())
    }

    /// Render subject and body into a notification for `ctx.publisher.email`.
    pub fn notification(&self, ctx: &FailureContext) -> Result<Notification, NotifyError> {
        Ok(Notification {
            recipient: ctx.publisher.email.clone(),
            subject: self.render(&self.subject, ctx)?,
            html_body: self.render(&self.body, ctx)?,
            metadata: HashMap::from([
                ("publisher_id".to_string(), ctx.publisher.id.clone()),
                ("url".to_string(), ctx.job.url.clone()),
                ("attempts".to_string(), ctx.job.attempts.to_string()),
            ]),
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}
