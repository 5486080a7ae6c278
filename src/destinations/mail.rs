use super::{wrong_type, DestinationFactory};
use crate::core::{DestinationResponse, DestinationType, MailSender};
use crate::error::{DispatchError, Result};
use crate::message::{MailMessage, MailMethod, Message};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Status reported for a delivered mail.
pub const MAIL_SENT_STATUS: u16 = 0;
/// Status reported when the SMTP exchange failed.
pub const MAIL_FAILED_STATUS: u16 = 1;

/// Sends mail and reports SMTP failures in the response instead of failing.
pub struct MailFactory {
    sender: Arc<dyn MailSender>,
}

impl MailFactory {
    pub fn new(sender: Arc<dyn MailSender>) -> Self {
        Self { sender }
    }

    pub fn get_client(&self) -> &Arc<dyn MailSender> {
        &self.sender
    }
}

#[async_trait]
impl DestinationFactory for MailFactory {
    fn destination_type(&self) -> DestinationType {
        DestinationType::Mail
    }

    #[instrument(skip_all)]
    async fn publish(&self, message: &Message) -> Result<DestinationResponse> {
        let Message::Mail(mail) = message else {
            return Err(wrong_type(DestinationType::Mail));
        };
        match self.sender.send(mail).await {
            Ok(()) => Ok(DestinationResponse::new(MAIL_SENT_STATUS, "Sent")),
            Err(e) => {
                warn!(host = mail.host(), error = %e, "Mail delivery failed");
                Ok(DestinationResponse::new(MAIL_FAILED_STATUS, e.to_string()))
            }
        }
    }
}

/// Delivers mail over a fresh SMTP session per message.
#[derive(Debug, Clone)]
pub struct SmtpMailSender {
    timeout: Duration,
}

impl SmtpMailSender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn compose(message: &MailMessage) -> Result<lettre::Message> {
        let from: Mailbox = message.from().parse().map_err(messaging)?;
        let mut builder = lettre::Message::builder()
            .from(from)
            .subject(message.subject());
        for recipient in message.recipients() {
            let to: Mailbox = recipient.parse().map_err(messaging)?;
            builder = builder.to(to);
        }
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.content().to_string())
            .map_err(messaging)
    }

    fn transport(&self, message: &MailMessage) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = message.host();
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(message.port())
            .timeout(Some(self.timeout));

        builder = match message.method() {
            MailMethod::None => builder.tls(Tls::None),
            MailMethod::Ssl => {
                builder.tls(Tls::Wrapper(TlsParameters::new(host.to_string()).map_err(messaging)?))
            }
            MailMethod::StartTls => {
                builder.tls(Tls::Required(TlsParameters::new(host.to_string()).map_err(messaging)?))
            }
        };
        if let Some((username, password)) = message.credentials() {
            builder = builder.credentials(Credentials::new(username.to_string(), password.to_string()));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    #[instrument(skip_all, fields(host = message.host(), port = message.port(), method = %message.method()))]
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let email = Self::compose(message)?;
        let transport = self.transport(message)?;
        transport.send(email).await.map_err(messaging)?;
        info!(recipients = message.recipients().len(), "Mail sent");
        Ok(())
    }
}

fn messaging(error: impl std::fmt::Display) -> DispatchError {
    DispatchError::Messaging(error.to_string())
}
