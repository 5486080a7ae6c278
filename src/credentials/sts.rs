//! Role assumption on top of the internal-auth base credentials.

use super::{CachedCredentialsProvider, CredentialCache, CredentialRecord};
use crate::core::{CredentialFetcher, CredentialSource};
use crate::message::TopicAuth;
use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sts::config::{BehaviorVersion, Region};
use aws_sdk_sts::error::DisplayErrorContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

const CN_NORTHWEST_1: &str = "cn-northwest-1";
const CN_NORTH_1: &str = "cn-north-1";
const GLOBAL_SIGNING_REGION: &str = "us-east-1";

/// Where STS calls go and which region they are signed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StsEndpoint {
    pub host: String,
    pub signing_region: String,
}

impl StsEndpoint {
    pub fn url(&self) -> String {
        format!("https://{}", self.host)
    }
}

/// Picks the STS endpoint for a region.
///
/// The China partitions have their own hosts. Anything blank or malformed
/// falls back to the global endpoint signed for us-east-1.
pub fn sts_endpoint(region: Option<&str>) -> StsEndpoint {
    let region = region.map(str::trim).filter(|r| is_region_name(r));
    match region {
        Some(CN_NORTHWEST_1) => StsEndpoint {
            host: "sts.cn-northwest-1.amazonaws.com.cn".to_string(),
            signing_region: CN_NORTHWEST_1.to_string(),
        },
        Some(CN_NORTH_1) => StsEndpoint {
            host: "sts.cn-north-1.amazonaws.com.cn".to_string(),
            signing_region: CN_NORTH_1.to_string(),
        },
        Some(region) => StsEndpoint {
            host: format!("sts.{region}.amazonaws.com"),
            signing_region: region.to_string(),
        },
        None => {
            info!("Region not provided, defaulting to global STS endpoint");
            StsEndpoint {
                host: "sts.amazonaws.com".to_string(),
                signing_region: GLOBAL_SIGNING_REGION.to_string(),
            }
        }
    }
}

fn is_region_name(region: &str) -> bool {
    !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Calls `AssumeRole` for one target role.
pub struct AssumeRoleFetcher {
    client: aws_sdk_sts::Client,
    role_arn: String,
    session_name: String,
}

impl AssumeRoleFetcher {
    pub fn new(client: aws_sdk_sts::Client, role_arn: String, session_name: String) -> Self {
        Self {
            client,
            role_arn,
            session_name,
        }
    }
}

#[async_trait]
impl CredentialFetcher for AssumeRoleFetcher {
    #[instrument(skip(self), fields(role_arn = %self.role_arn))]
    async fn fetch(&self) -> Option<CredentialRecord> {
        let output = match self
            .client
            .assume_role()
            .role_arn(&self.role_arn)
            .role_session_name(&self.session_name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!(error = %DisplayErrorContext(&e), "AssumeRole call failed");
                return None;
            }
        };

        let credentials = output.credentials()?;
        Some(CredentialRecord {
            access_key: credentials.access_key_id().to_string(),
            secret_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiry_epoch_millis: credentials.expiration().to_millis().unwrap_or_default(),
        })
    }
}

/// Serves role-based auth by assuming the role with internal-auth credentials.
pub struct AssumeRoleSource {
    base: Arc<CredentialCache>,
    endpoint: StsEndpoint,
    session_name: String,
    buffer: Duration,
}

impl AssumeRoleSource {
    pub fn new(
        base: Arc<CredentialCache>,
        endpoint: StsEndpoint,
        session_name: impl Into<String>,
        buffer: Duration,
    ) -> Self {
        Self {
            base,
            endpoint,
            session_name: session_name.into(),
            buffer,
        }
    }

    pub fn endpoint(&self) -> &StsEndpoint {
        &self.endpoint
    }

    fn sts_client(&self) -> aws_sdk_sts::Client {
        let config = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.endpoint.signing_region.clone()))
            .endpoint_url(self.endpoint.url())
            .credentials_provider(CachedCredentialsProvider::new(self.base.clone()))
            .build();
        aws_sdk_sts::Client::from_conf(config)
    }
}

#[async_trait]
impl CredentialSource for AssumeRoleSource {
    fn name(&self) -> &'static str {
        "internal-auth-assume-role"
    }

    async fn provider(&self, auth: &TopicAuth) -> Option<SharedCredentialsProvider> {
        let TopicAuth::Role(role_arn) = auth else {
            return None;
        };
        if self.base.get().await.is_none() {
            info!("Could not fetch credentials from internal service to assume role");
            return None;
        }

        info!(role_arn = %role_arn, sts = %self.endpoint.host, "Assuming role through STS");
        let fetcher = AssumeRoleFetcher::new(
            self.sts_client(),
            role_arn.clone(),
            self.session_name.clone(),
        );
        let cache = CredentialCache::with_buffer("sts-assume-role", Arc::new(fetcher), self.buffer);
        Some(SharedCredentialsProvider::new(
            CachedCredentialsProvider::new(Arc::new(cache)),
        ))
    }
}
