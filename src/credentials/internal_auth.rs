//! A client for the local internal-auth credential endpoint.

use super::CredentialRecord;
use crate::config::CredentialsConfig;
use crate::core::CredentialFetcher;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Fetches base credentials from `/_internal/auth` for one policy.
pub struct InternalAuthClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl InternalAuthClient {
    pub fn from_config(config: &CredentialsConfig) -> Result<Self> {
        let mut endpoint = Url::parse(&format!(
            "http://{}:{}/_internal/auth",
            config.internal_auth_host, config.internal_auth_port
        ))
        .context("invalid internal auth endpoint")?;
        endpoint
            .query_pairs_mut()
            .append_pair("policy_id", &config.policy_id);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(5)
            .build()
            .context("failed to build internal auth HTTP client")?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(&self) -> Result<CredentialRecord> {
        let response = self.client.get(self.endpoint.clone()).send().await?;
        if response.status() != StatusCode::OK {
            bail!(
                "Request to internal auth failed with status {}",
                response.status()
            );
        }
        let body = response.text().await?;
        let record: CredentialRecord =
            serde_json::from_str(&body).context("Error parsing internal auth credentials")?;
        Ok(record)
    }
}

#[async_trait]
impl CredentialFetcher for InternalAuthClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> Option<CredentialRecord> {
        match self.request().await {
            Ok(record) if record.is_valid() => Some(record),
            Ok(_) => {
                debug!("Internal auth returned an empty credential document");
                None
            }
            Err(e) => {
                error!(error = %e, "Could not fetch credentials from internal auth");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> InternalAuthClient {
        let address = server.address();
        let config = CredentialsConfig {
            internal_auth_host: address.ip().to_string(),
            internal_auth_port: address.port(),
            ..Default::default()
        };
        InternalAuthClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_credentials() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_internal/auth"))
            .and(query_param("policy_id", "AR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_key": "ASIA1",
                "secret_key": "s",
                "session_token": "t",
                "expiry": 1_900_000_000_000_i64
            })))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        // Act
        let record = client.fetch().await;

        // Assert
        let record = record.expect("credentials");
        assert_eq!(record.access_key, "ASIA1");
        assert_eq!(record.expiry_epoch_millis, 1_900_000_000_000);
    }

    #[tokio::test]
    async fn test_non_ok_status_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "access_key": "ASIA1", "secret_key": "s", "session_token": "t", "expiry": 1
            })))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert!(client.fetch().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert!(client.fetch().await.is_none());
    }
}
