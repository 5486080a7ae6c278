//! Outbound HTTP delivery with SSRF enforcement and response normalization.

mod blocklist;
mod pool;
mod resolver;

pub use blocklist::{default_blocked_ranges, IpBlocklist, DEFAULT_BLOCKED_RANGES};
pub use pool::ConnectionPool;
pub use resolver::{GuardedResolver, HickoryHostResolver};

use crate::config::TransportConfig;
use crate::core::{DestinationResponse, HostResolver, HttpExecutor};
use crate::error::{DispatchError, Result};
use reqwest::{Method, Url};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error};

/// Statuses that count as a delivered request.
pub const SUCCESS_STATUSES: [u16; 8] = [200, 201, 202, 203, 204, 205, 206, 207];

/// Content reported when the endpoint sent no response entity at all.
pub const EMPTY_ENTITY: &str = "{}";

/// A fully built outbound request.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            basic_auth: None,
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field(
                "headers",
                &self.headers.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("basic_auth", &self.basic_auth.as_ref().map(|(u, _)| u))
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// The status and body as read off the wire.
///
/// `body` is `None` when the response carried no entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<String>,
}

/// Checks the destination, sends the request and normalizes the response.
pub struct HttpTransport {
    executor: Arc<dyn HttpExecutor>,
    pool: Option<Arc<ConnectionPool>>,
    guard: GuardedResolver,
}

impl HttpTransport {
    /// The production transport over a shared connection pool.
    pub fn pooled(
        config: TransportConfig,
        resolver: Arc<dyn HostResolver>,
        blocklist: Arc<IpBlocklist>,
    ) -> Result<Self> {
        let guard = GuardedResolver::new(resolver, blocklist);
        let pool = Arc::new(ConnectionPool::new(config, Arc::new(guard.clone()))?);
        Ok(Self {
            executor: pool.clone(),
            pool: Some(pool),
            guard,
        })
    }

    /// A transport over an arbitrary executor, with the same destination checks.
    pub fn with_executor(
        executor: Arc<dyn HttpExecutor>,
        resolver: Arc<dyn HostResolver>,
        blocklist: Arc<IpBlocklist>,
    ) -> Self {
        Self {
            executor,
            pool: None,
            guard: GuardedResolver::new(resolver, blocklist),
        }
    }

    pub fn pool(&self) -> Option<&Arc<ConnectionPool>> {
        self.pool.as_ref()
    }

    /// Sends `request` and returns the normalized response.
    ///
    /// The destination host is resolved and checked against the blocklist
    /// before anything is sent. Statuses outside [`SUCCESS_STATUSES`] fail
    /// with [`DispatchError::HttpStatus`].
    pub async fn execute(&self, request: HttpRequest) -> Result<DestinationResponse> {
        self.check_destination(&request.url).await?;

        let raw = self.executor.execute(request).await?;
        if !SUCCESS_STATUSES.contains(&raw.status) {
            let body = raw.body.unwrap_or_default();
            error!(status = raw.status, body = %body, "Destination rejected the request");
            return Err(DispatchError::HttpStatus {
                status: raw.status,
                body,
            });
        }

        debug!(status = raw.status, "Destination accepted the request");
        Ok(normalize(raw))
    }

    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown().await;
        }
    }

    async fn check_destination(&self, url: &Url) -> Result<()> {
        let Some(host) = url.host_str().map(|h| h.trim_matches(['[', ']'])) else {
            return Err(DispatchError::validation(format!(
                "Fully qualified URL is missing/invalid: {url}"
            )));
        };
        match host.parse::<IpAddr>() {
            Ok(ip) => self.guard.blocklist().check(host, ip),
            Err(_) => self.guard.resolve_checked(host).await.map(|_| ()),
        }
    }
}

/// Maps an accepted response to its reported content.
///
/// A missing entity becomes `"{}"`; an empty body stays empty.
pub fn normalize(raw: RawResponse) -> DestinationResponse {
    let content = raw.body.unwrap_or_else(|| EMPTY_ENTITY.to_string());
    DestinationResponse::new(raw.status, content)
}
