//! The error taxonomy shared by every delivery path.

use std::net::IpAddr;
use thiserror::Error;

/// Failures surfaced by message construction and delivery.
///
/// Validation, unsupported-type and SSRF failures describe a malformed or
/// dangerous message and are never worth retrying. Credential, resolution and
/// transport failures are transient from the caller's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A message builder constraint was violated.
    #[error("{0}")]
    Validation(String),

    /// No factory is registered for the destination type.
    #[error("Unsupported destination type: {0}")]
    UnsupportedDestination(String),

    /// Every credential source in the chain came back empty.
    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    /// The destination host resolved to a blocklisted address.
    #[error("Destination host {host} resolves to blocked address {ip}")]
    SsrfBlocked { host: String, ip: IpAddr },

    /// The destination host could not be resolved.
    #[error("Failed to resolve destination host: {0}")]
    Resolution(String),

    /// The endpoint answered with a status outside the accepted set.
    #[error("Failed: HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// An I/O error while talking to the endpoint.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The pub/sub provider rejected the publish call.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// SMTP session or message composition failure.
    #[error("{0}")]
    Messaging(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the failure is indistinguishable from a bad request.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::UnsupportedDestination(_) | Self::SsrfBlocked { .. }
        )
    }

    /// True when a caller may reasonably retry the publish later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CredentialsUnavailable(_)
                | Self::Resolution(_)
                | Self::HttpStatus { .. }
                | Self::Transport(_)
                | Self::Publish(_)
        )
    }

    /// A short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnsupportedDestination(_) => "unsupported_destination",
            Self::CredentialsUnavailable(_) => "credentials_unavailable",
            Self::SsrfBlocked { .. } => "ssrf_blocked",
            Self::Resolution(_) => "resolution",
            Self::HttpStatus { .. } => "http_status",
            Self::Transport(_) => "transport",
            Self::Publish(_) => "publish",
            Self::Messaging(_) => "messaging",
        }
    }
}
