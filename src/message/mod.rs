//! Validated, immutable message values, one per destination type.
//!
//! Every message is produced by a builder whose `build()` checks its fields in
//! a fixed order and stops at the first violated rule. Nothing here touches
//! the network or credentials.

pub mod arn;
mod chat;
mod mail;
mod request;
mod sns;
mod webhook;

pub use chat::{ChatMessage, ChatMessageBuilder};
pub use mail::{MailMessage, MailMessageBuilder, MailMethod};
pub use request::{DestinationRequest, Recipients};
pub use sns::{SnsMessage, SnsMessageBuilder, TopicAuth};
pub use webhook::{CustomWebhookMessage, CustomWebhookMessageBuilder};

use crate::core::DestinationType;
use crate::error::{DispatchError, Result};
use std::fmt;

/// A message addressed to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Sns(SnsMessage),
    Chime(ChatMessage),
    Slack(ChatMessage),
    CustomWebhook(CustomWebhookMessage),
    Mail(MailMessage),
}

impl Message {
    pub fn destination_type(&self) -> DestinationType {
        match self {
            Message::Sns(_) => DestinationType::Sns,
            Message::Chime(_) => DestinationType::Chime,
            Message::Slack(_) => DestinationType::Slack,
            Message::CustomWebhook(_) => DestinationType::CustomWebhook,
            Message::Mail(_) => DestinationType::Mail,
        }
    }

    pub fn destination_name(&self) -> &str {
        match self {
            Message::Sns(m) => m.destination_name(),
            Message::Chime(m) | Message::Slack(m) => m.destination_name(),
            Message::CustomWebhook(m) => m.destination_name(),
            Message::Mail(m) => m.destination_name(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::Sns(m) => m.content(),
            Message::Chime(m) | Message::Slack(m) => m.content(),
            Message::CustomWebhook(m) => m.content(),
            Message::Mail(m) => m.content(),
        }
    }
}

impl From<SnsMessage> for Message {
    fn from(m: SnsMessage) -> Self {
        Message::Sns(m)
    }
}

impl From<CustomWebhookMessage> for Message {
    fn from(m: CustomWebhookMessage) -> Self {
        Message::CustomWebhook(m)
    }
}

impl From<MailMessage> for Message {
    fn from(m: MailMessage) -> Self {
        Message::Mail(m)
    }
}

impl From<ChatMessage> for Message {
    fn from(m: ChatMessage) -> Self {
        match m.destination_type() {
            DestinationType::Chime => Message::Chime(m),
            _ => Message::Slack(m),
        }
    }
}

/// A one-line summary for failure logs. Never includes credentials or content.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DestinationType: {}, DestinationName: {}",
            self.destination_type(),
            self.destination_name()
        )?;
        match self {
            Message::Sns(m) => write!(f, ", TopicArn: {}", m.topic_arn()),
            Message::Chime(m) | Message::Slack(m) => write!(f, ", Url: {}", redact_url(m.url())),
            Message::CustomWebhook(m) => {
                write!(f, ", Url: {}, Method: {}", redact_url(m.url()), m.method())
            }
            Message::Mail(m) => write!(
                f,
                ", Host: {}, Port: {}, Method: {}",
                m.host(),
                m.port(),
                m.method()
            ),
        }
    }
}

/// Scheme, host and port only. Webhook paths and query strings often carry tokens.
fn redact_url(url: &reqwest::Url) -> String {
    let origin = url.origin().ascii_serialization();
    if url.path() == "/" && url.query().is_none() {
        origin
    } else {
        format!("{origin}/<redacted>")
    }
}

// =============================================================================
// Shared builder checks
// =============================================================================

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DispatchError::validation("Channel name must be defined"));
    }
    Ok(())
}

fn require_type(actual: DestinationType, expected: DestinationType) -> Result<()> {
    if actual != expected {
        return Err(DispatchError::validation(format!(
            "Channel Type does not match {}",
            expected.label()
        )));
    }
    Ok(())
}

fn require_content(content: Option<&str>) -> Result<&str> {
    match content {
        Some(c) if !c.is_empty() => Ok(c),
        _ => Err(DispatchError::validation("Message content is missing")),
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Renders an optional field the way validation errors report it.
fn or_null(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("null")
}
