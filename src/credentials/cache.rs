use super::CredentialRecord;
use crate::core::CredentialFetcher;
use arc_swap::ArcSwapOption;
use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(10);

/// Caches the last credential record from a fetcher and refreshes it on expiry.
///
/// Reads are lock-free. Refreshes go through a single async mutex, so
/// concurrent callers that all observe an expired record trigger one fetch;
/// the rest wait and then read what the winner stored.
pub struct CredentialCache {
    name: &'static str,
    fetcher: Arc<dyn CredentialFetcher>,
    current: ArcSwapOption<CredentialRecord>,
    refresh_lock: Mutex<()>,
    buffer: Duration,
}

impl CredentialCache {
    pub fn new(name: &'static str, fetcher: Arc<dyn CredentialFetcher>) -> Self {
        Self::with_buffer(name, fetcher, DEFAULT_EXPIRY_BUFFER)
    }

    pub fn with_buffer(
        name: &'static str,
        fetcher: Arc<dyn CredentialFetcher>,
        buffer: Duration,
    ) -> Self {
        Self {
            name,
            fetcher,
            current: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
            buffer,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the cached record while it is usable, otherwise refreshes.
    pub async fn get(&self) -> Option<Arc<CredentialRecord>> {
        if let Some(record) = self.usable() {
            return Some(record);
        }
        self.refresh().await
    }

    /// Fetches a new record unless another caller already did.
    ///
    /// A failed fetch clears the cache.
    pub async fn refresh(&self) -> Option<Arc<CredentialRecord>> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(record) = self.usable() {
            return Some(record);
        }

        match self.fetcher.fetch().await {
            Some(record) if record.is_valid() => {
                debug!(cache = self.name, expiry = record.expiry_epoch_millis, "Refreshed credentials");
                metrics::counter!("credential_refresh_total", "cache" => self.name, "outcome" => "success")
                    .increment(1);
                let record = Arc::new(record);
                self.current.store(Some(record.clone()));
                Some(record)
            }
            _ => {
                warn!(cache = self.name, "Credential refresh returned nothing usable");
                metrics::counter!("credential_refresh_total", "cache" => self.name, "outcome" => "failure")
                    .increment(1);
                self.current.store(None);
                None
            }
        }
    }

    fn usable(&self) -> Option<Arc<CredentialRecord>> {
        let now = chrono::Utc::now().timestamp_millis();
        self.current
            .load_full()
            .filter(|r| r.is_valid() && !r.is_expired_at(now, self.buffer))
    }
}

/// Exposes a [`CredentialCache`] to the AWS SDK.
#[derive(Clone)]
pub struct CachedCredentialsProvider {
    cache: Arc<CredentialCache>,
}

impl CachedCredentialsProvider {
    pub fn new(cache: Arc<CredentialCache>) -> Self {
        Self { cache }
    }

    async fn load(&self) -> provider::Result {
        match self.cache.get().await {
            Some(record) => Ok(record.to_aws(self.cache.name())),
            None => Err(CredentialsError::not_loaded(format!(
                "{} has no usable credentials",
                self.cache.name()
            ))),
        }
    }
}

impl fmt::Debug for CachedCredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredentialsProvider")
            .field("cache", &self.cache.name())
            .finish()
    }
}

impl ProvideCredentials for CachedCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.load())
    }
}
