//! SMTP email notifier via `lettre`.
//!
//! Delivers HTML notifications through an SMTP server configured from an
//! explicit [`SmtpConfig`]. STARTTLS is negotiated according to the
//! configured policy; port 465 always uses implicit TLS.

use feedpoll_core::config::{SmtpConfig, StartTlsPolicy};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{Tls, TlsParameters},
        extension::ClientId,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::traits::{Notification, Notifier, NotifyError};

/// Sends notifications as HTML emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    /// Async SMTP transport for sending emails.
    transport: AsyncSmtpTransport<Tokio1Executor>,
    /// Sender mailbox.
    from: Mailbox,
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from SMTP configuration.
    ///
    /// Authenticates with PLAIN using the configured username and password
    /// and announces `config.domain` in EHLO. No connection is opened until
    /// the first send.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let tls = tls_for(config)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            .port(config.port)
            .tls(tls)
            .hello_name(ClientId::Domain(config.domain.clone()))
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .build();

        Ok(Self { transport, from })
    }
}

fn tls_for(config: &SmtpConfig) -> Result<Tls, NotifyError> {
    let params = || {
        TlsParameters::new(config.host.clone()).map_err(|e| NotifyError::Config(e.to_string()))
    };

    // Port 465 uses implicit TLS; everything else follows the STARTTLS policy.
    let tls = if config.port == 465 {
        Tls::Wrapper(params()?)
    } else {
        match config.starttls {
            StartTlsPolicy::Auto => Tls::Opportunistic(params()?),
            StartTlsPolicy::Always => Tls::Required(params()?),
            StartTlsPolicy::Never => Tls::None,
        }
    };
    Ok(tls)
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let to: Mailbox = notification
            .recipient
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(notification.html_body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        Ok(())
    }

    /// Returns `"email"`.
    fn channel_name(&self) -> &str {
        "email"
    }
}
