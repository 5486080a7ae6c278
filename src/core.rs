//! Core domain types and service traits for alertdispatch
//!
//! This module defines the destination tag, the normalized delivery response
//! and the trait contracts at every seam where a network collaborator can be
//! swapped out (DNS, HTTP, pub/sub, SMTP, credential sources).

use crate::credentials::CredentialRecord;
use crate::error::{DispatchError, Result};
use crate::message::{MailMessage, TopicAuth};
use crate::transport::{HttpRequest, RawResponse};
use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

/// The closed set of supported destination types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    Sns,
    Chime,
    Slack,
    CustomWebhook,
    Mail,
}

impl DestinationType {
    pub const ALL: [DestinationType; 5] = [
        DestinationType::Sns,
        DestinationType::Chime,
        DestinationType::Slack,
        DestinationType::CustomWebhook,
        DestinationType::Mail,
    ];

    /// The wire tag, as used in configuration and JSON requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Sns => "sns",
            DestinationType::Chime => "chime",
            DestinationType::Slack => "slack",
            DestinationType::CustomWebhook => "custom_webhook",
            DestinationType::Mail => "mail",
        }
    }

    /// The label used in "Channel Type does not match ..." errors.
    pub fn label(&self) -> &'static str {
        match self {
            DestinationType::Sns => "SNS",
            DestinationType::Chime => "CHIME",
            DestinationType::Slack => "Slack",
            DestinationType::CustomWebhook => "CustomWebhook",
            DestinationType::Mail => "Mail",
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        DestinationType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DispatchError::UnsupportedDestination(s.to_string()))
    }
}

/// The normalized outcome of a publish call.
///
/// `status_code` is the HTTP status for HTTP-backed destinations, the
/// provider status for pub/sub, and `0`/`1` (sent/failed) for mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationResponse {
    status_code: u16,
    content: String,
}

impl DestinationResponse {
    pub fn new(status_code: u16, content: impl Into<String>) -> Self {
        Self {
            status_code,
            content: content.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// What a pub/sub provider reports back for an accepted publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: String,
    pub status_code: u16,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Resolves a host name to the addresses a connection would use.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolves `host` to its IPv4 and IPv6 addresses.
    ///
    /// IP literals resolve to themselves without a lookup.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// Sends a fully built HTTP request and returns the raw response.
///
/// Implementations do not judge the status code; that is the transport's job.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse>;
}

/// Produces credential records from some backing service.
#[async_trait]
pub trait CredentialFetcher: Send + Sync {
    /// Returns `None` when the service has no usable credentials.
    async fn fetch(&self) -> Option<CredentialRecord>;
}

/// One entry in the credential provisioning chain.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Returns a provider for `auth`, or `None` if this source cannot serve it.
    async fn provider(&self, auth: &TopicAuth) -> Option<SharedCredentialsProvider>;
}

/// A client bound to one region and one set of credentials.
#[async_trait]
pub trait TopicClient: Send + Sync {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<PublishReceipt>;
}

/// Constructs topic clients; construction is assumed to be expensive.
pub trait TopicClientFactory: Send + Sync {
    fn build(&self, region: &str, credentials: SharedCredentialsProvider) -> Arc<dyn TopicClient>;
}

/// Delivers a mail message over an SMTP session.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Fails with [`DispatchError::Messaging`] on any SMTP or composition error.
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_type_round_trips_through_str() {
        for t in DestinationType::ALL {
            assert_eq!(t.as_str().parse::<DestinationType>().unwrap(), t);
        }
        assert!(matches!(
            "pagerduty".parse::<DestinationType>(),
            Err(DispatchError::UnsupportedDestination(_))
        ));
    }

    #[test]
    fn test_destination_type_deserializes_snake_case() {
        let t: DestinationType = serde_json::from_str("\"custom_webhook\"").unwrap();
        assert_eq!(t, DestinationType::CustomWebhook);
    }
}
