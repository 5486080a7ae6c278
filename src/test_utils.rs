//! In-memory fakes for every network seam.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for the
//! integration tests under `tests/`.

use crate::core::{
    CredentialFetcher, CredentialSource, DestinationResponse, DestinationType, HostResolver,
    HttpExecutor, MailSender, PublishReceipt, TopicClient, TopicClientFactory,
};
use crate::credentials::CredentialRecord;
use crate::destinations::DestinationFactory;
use crate::error::{DispatchError, Result};
use crate::message::{MailMessage, Message, TopicAuth};
use crate::transport::{HttpRequest, RawResponse};
use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Resolves from a fixed table. Unknown hosts fail to resolve.
#[derive(Default)]
pub struct FakeHostResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
    lookups: AtomicUsize,
}

impl FakeHostResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `host` with `ips`. Panics on a malformed address.
    pub fn with_host(mut self, host: &str, ips: &[&str]) -> Self {
        let ips = ips
            .iter()
            .map(|ip| ip.parse().expect("fake resolver address"))
            .collect();
        self.hosts.insert(host.to_ascii_lowercase(), ips);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostResolver for FakeHostResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        self.hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| DispatchError::Resolution(format!("no fake answer for {host}")))
    }
}

/// Answers every request with the same status and body and keeps the requests.
pub struct RecordingHttpExecutor {
    status: u16,
    body: Option<String>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingHttpExecutor {
    pub fn responding(status: u16, body: Option<&str>) -> Self {
        Self {
            status,
            body: body.map(str::to_string),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpExecutor for RecordingHttpExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(RawResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Issues short-lived records and counts how often it was asked.
pub struct CountingCredentialFetcher {
    validity: Option<Duration>,
    delay: Duration,
    count: AtomicUsize,
}

impl CountingCredentialFetcher {
    /// Every fetch yields a record expiring `validity` from now.
    pub fn valid_for(validity: Duration) -> Self {
        Self {
            validity: Some(validity),
            delay: Duration::ZERO,
            count: AtomicUsize::new(0),
        }
    }

    /// Every fetch yields nothing.
    pub fn empty() -> Self {
        Self {
            validity: None,
            delay: Duration::ZERO,
            count: AtomicUsize::new(0),
        }
    }

    /// Sleeps before answering so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialFetcher for CountingCredentialFetcher {
    async fn fetch(&self) -> Option<CredentialRecord> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let validity = self.validity?;
        let expiry = chrono::Utc::now() + chrono::Duration::from_std(validity).ok()?;
        Some(CredentialRecord {
            access_key: "ASIATEST".to_string(),
            secret_key: format!("secret-{n}"),
            session_token: format!("token-{n}"),
            expiry_epoch_millis: expiry.timestamp_millis(),
        })
    }
}

/// A chain entry that either always declines or always serves fixed keys.
pub struct FakeCredentialSource {
    name: &'static str,
    keys: Option<(String, String)>,
    calls: AtomicUsize,
}

impl FakeCredentialSource {
    pub fn empty(name: &'static str) -> Self {
        Self {
            name,
            keys: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_keys(name: &'static str, access_key: &str, secret_key: &str) -> Self {
        Self {
            name,
            keys: Some((access_key.to_string(), secret_key.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for FakeCredentialSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn provider(&self, _auth: &TopicAuth) -> Option<SharedCredentialsProvider> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (access_key, secret_key) = self.keys.clone()?;
        Some(SharedCredentialsProvider::new(Credentials::new(
            access_key, secret_key, None, None, self.name,
        )))
    }
}

/// One publish seen by a [`FakeTopicClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub region: String,
    pub topic_arn: String,
    pub message: String,
    pub subject: Option<String>,
}

/// Builds [`FakeTopicClient`]s that all record into one shared log.
pub struct RecordingTopicClientFactory {
    message_id: String,
    built_regions: Mutex<Vec<String>>,
    published: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl Default for RecordingTopicClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTopicClientFactory {
    pub fn new() -> Self {
        Self {
            message_id: "message-1".to_string(),
            built_regions: Mutex::new(Vec::new()),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The id every built client reports; empty simulates a missing id.
    pub fn with_message_id(mut self, message_id: &str) -> Self {
        self.message_id = message_id.to_string();
        self
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn built_regions(&self) -> Vec<String> {
        self.built_regions.lock().unwrap().clone()
    }

    pub fn build_count(&self) -> usize {
        self.built_regions.lock().unwrap().len()
    }
}

impl TopicClientFactory for RecordingTopicClientFactory {
    fn build(&self, region: &str, _credentials: SharedCredentialsProvider) -> Arc<dyn TopicClient> {
        self.built_regions.lock().unwrap().push(region.to_string());
        Arc::new(FakeTopicClient {
            region: region.to_string(),
            message_id: self.message_id.clone(),
            published: self.published.clone(),
        })
    }
}

pub struct FakeTopicClient {
    region: String,
    message_id: String,
    published: Arc<Mutex<Vec<PublishedMessage>>>,
}

#[async_trait]
impl TopicClient for FakeTopicClient {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<PublishReceipt> {
        self.published.lock().unwrap().push(PublishedMessage {
            region: self.region.clone(),
            topic_arn: topic_arn.to_string(),
            message: message.to_string(),
            subject: subject.map(str::to_string),
        });
        Ok(PublishReceipt {
            message_id: self.message_id.clone(),
            status_code: 200,
        })
    }
}

/// A factory that answers with a fixed response.
pub struct StaticDestinationFactory {
    destination_type: DestinationType,
    response: DestinationResponse,
    calls: AtomicUsize,
}

impl StaticDestinationFactory {
    pub fn new(destination_type: DestinationType, status_code: u16, content: &str) -> Self {
        Self {
            destination_type,
            response: DestinationResponse::new(status_code, content),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DestinationFactory for StaticDestinationFactory {
    fn destination_type(&self) -> DestinationType {
        self.destination_type
    }

    async fn publish(&self, _message: &Message) -> Result<DestinationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Keeps sent mail in memory, or fails every send with a fixed error.
#[derive(Default)]
pub struct RecordingMailSender {
    failure: Option<String>,
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: &str) -> Self {
        Self {
            failure: Some(error.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        if let Some(error) = &self.failure {
            return Err(DispatchError::Messaging(error.clone()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
