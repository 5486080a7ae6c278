//! Credential provisioning for topic delivery.
//!
//! A [`CredentialChain`] asks each [`CredentialSource`] in order for a
//! provider that can authenticate a given [`TopicAuth`]. The first source that
//! answers wins. Role-based auth goes through the internal-auth service and STS;
//! key-based auth wraps the caller's keys as they are.

mod cache;
mod internal_auth;
mod static_keys;
mod sts;

pub use cache::{CachedCredentialsProvider, CredentialCache};
pub use internal_auth::InternalAuthClient;
pub use static_keys::StaticKeySource;
pub use sts::{sts_endpoint, AssumeRoleFetcher, AssumeRoleSource, StsEndpoint};

use crate::core::CredentialSource;
use crate::error::{DispatchError, Result};
use crate::message::TopicAuth;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, warn};

/// A set of temporary credentials as issued by the internal-auth service or STS.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CredentialRecord {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
    #[serde(rename = "expiry")]
    pub expiry_epoch_millis: i64,
}

impl CredentialRecord {
    /// All three secret strings are present.
    pub fn is_valid(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty() && !self.session_token.is_empty()
    }

    /// True once `now` is within `buffer` of the expiry instant.
    pub fn is_expired_at(&self, now_epoch_millis: i64, buffer: Duration) -> bool {
        let buffer_millis = i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX);
        now_epoch_millis > self.expiry_epoch_millis.saturating_sub(buffer_millis)
    }

    pub fn to_aws(&self, provider_name: &'static str) -> Credentials {
        let expiry = u64::try_from(self.expiry_epoch_millis)
            .ok()
            .map(|ms| UNIX_EPOCH + Duration::from_millis(ms));
        Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            Some(self.session_token.clone()),
            expiry,
            provider_name,
        )
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiry", &self.expiry_epoch_millis)
            .finish()
    }
}

/// Ordered credential sources; the first that yields a provider wins.
#[derive(Clone)]
pub struct CredentialChain {
    sources: Vec<Arc<dyn CredentialSource>>,
}

impl CredentialChain {
    pub fn new(sources: Vec<Arc<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Assume-role through internal auth first, then static keys.
    pub fn standard(assume_role: AssumeRoleSource) -> Self {
        Self::new(vec![Arc::new(assume_role), Arc::new(StaticKeySource)])
    }

    pub async fn provider_for(&self, auth: &TopicAuth) -> Result<SharedCredentialsProvider> {
        for source in &self.sources {
            if let Some(provider) = source.provider(auth).await {
                debug!(source = source.name(), "Credential source supplied a provider");
                return Ok(provider);
            }
        }
        warn!(?auth, "No credential source could supply credentials");
        Err(DispatchError::CredentialsUnavailable(match auth {
            TopicAuth::Role(arn) => format!("no credentials to assume role {arn}"),
            TopicAuth::IamKeys { .. } => "no credentials for IAM key pair".to_string(),
        }))
    }
}
