//! The shared, bounded HTTP client and its idle-route eviction task.

use super::resolver::GuardedResolver;
use super::{HttpRequest, RawResponse};
use crate::config::TransportConfig;
use crate::core::HttpExecutor;
use crate::error::{DispatchError, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

struct Route {
    permits: Arc<Semaphore>,
    last_used: Instant,
}

struct PoolState {
    config: TransportConfig,
    resolver: Arc<GuardedResolver>,
    client: ArcSwap<reqwest::Client>,
    total: Arc<Semaphore>,
    routes: Mutex<HashMap<String, Route>>,
}

/// One pooled HTTP client per dispatch context.
///
/// Concurrency is bounded overall and per route (scheme, host and port).
/// A background task drops routes idle past the configured threshold and,
/// once no route is left, swaps in a fresh client so the old sockets close.
pub struct ConnectionPool {
    state: Arc<PoolState>,
    shutdown_tx: watch::Sender<()>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Builds the client and starts the eviction task. Must run inside a Tokio runtime.
    pub fn new(config: TransportConfig, resolver: Arc<GuardedResolver>) -> Result<Self> {
        let client = build_client(&config, &resolver)?;
        let state = Arc::new(PoolState {
            total: Arc::new(Semaphore::new(config.max_connections)),
            client: ArcSwap::from_pointee(client),
            routes: Mutex::new(HashMap::new()),
            resolver,
            config,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let monitor = tokio::spawn(run_eviction(state.clone(), shutdown_rx));

        Ok(Self {
            state,
            shutdown_tx,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.state.config
    }

    /// Number of routes currently tracked.
    pub async fn route_count(&self) -> usize {
        self.state.routes.lock().await.len()
    }

    /// Runs one eviction sweep now. Returns the number of routes removed.
    pub async fn evict_idle(&self) -> usize {
        self.state.evict_idle().await
    }

    /// Stops the eviction task and waits for it to exit.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.monitor.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Connection pool monitor task failed");
            }
        }
        info!("Connection pool shut down.");
    }

    /// Route permit first, then the global one. A request queued on a busy
    /// route holds no global capacity.
    async fn acquire(&self, url: &Url) -> Result<(OwnedSemaphorePermit, OwnedSemaphorePermit)> {
        let route = self.state.route_permits(url).await;
        let total = self.state.total.clone();
        let wait = async move {
            let route = route.acquire_owned().await;
            let total = total.acquire_owned().await;
            (route, total)
        };

        match tokio::time::timeout(self.state.config.connect_timeout(), wait).await {
            Ok((Ok(route), Ok(total))) => Ok((route, total)),
            Ok(_) => Err(DispatchError::Transport("connection pool is closed".to_string())),
            Err(_) => Err(DispatchError::Transport(
                "timed out waiting for a pooled connection".to_string(),
            )),
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[async_trait]
impl HttpExecutor for ConnectionPool {
    #[instrument(skip(self, request), fields(method = %request.method, host = request.url.host_str().unwrap_or_default()))]
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse> {
        let _permits = self.acquire(&request.url).await?;
        let attempts = self.state.config.connect_attempts.max(1);

        let mut attempt = 1;
        let result = loop {
            let client = self.state.client.load_full();
            match send(&client, &request).await {
                Ok(response) => break Ok(response),
                Err(e) if attempt < attempts && e.is_connect() && dispatch_cause(&e).is_none() => {
                    warn!(attempt, error = %e, "Connection failed before reaching the server, retrying");
                    attempt += 1;
                }
                Err(e) => break Err(classify(e)),
            }
        };

        self.state.touch(&request.url).await;
        result
    }
}

impl PoolState {
    async fn route_permits(&self, url: &Url) -> Arc<Semaphore> {
        let mut routes = self.routes.lock().await;
        let route = routes.entry(route_key(url)).or_insert_with(|| Route {
            permits: Arc::new(Semaphore::new(self.config.max_connections_per_route)),
            last_used: Instant::now(),
        });
        route.last_used = Instant::now();
        route.permits.clone()
    }

    async fn touch(&self, url: &Url) {
        if let Some(route) = self.routes.lock().await.get_mut(&route_key(url)) {
            route.last_used = Instant::now();
        }
    }

    async fn evict_idle(&self) -> usize {
        let idle_timeout = self.config.idle_timeout();
        let per_route = self.config.max_connections_per_route;

        let mut routes = self.routes.lock().await;
        let before = routes.len();
        routes.retain(|key, route| {
            let idle = Arc::strong_count(&route.permits) == 1
                && route.permits.available_permits() == per_route
                && route.last_used.elapsed() >= idle_timeout;
            if idle {
                debug!(route = %key, "Evicting idle route");
            }
            !idle
        });
        let evicted = before - routes.len();
        if evicted == 0 {
            return 0;
        }
        metrics::counter!("transport_idle_routes_evicted_total").increment(evicted as u64);

        if routes.is_empty() && self.total.available_permits() == self.config.max_connections {
            match build_client(&self.config, &self.resolver) {
                Ok(client) => {
                    self.client.store(Arc::new(client));
                    debug!("All routes idle, recycled the HTTP client");
                }
                Err(e) => warn!(error = %e, "Failed to recycle the HTTP client"),
            }
        }
        evicted
    }
}

async fn run_eviction(state: Arc<PoolState>, mut shutdown_rx: watch::Receiver<()>) {
    let mut timer = tokio::time::interval(state.config.eviction_interval());
    timer.tick().await;
    debug!("Idle connection monitor started.");
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                debug!("Idle connection monitor received shutdown. Exiting.");
                break;
            }
            _ = timer.tick() => {
                state.evict_idle().await;
            }
        }
    }
}

fn build_client(config: &TransportConfig, resolver: &Arc<GuardedResolver>) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .read_timeout(config.read_timeout())
        .pool_max_idle_per_host(config.max_connections_per_route)
        .pool_idle_timeout(config.idle_timeout())
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .dns_resolver(resolver.clone())
        .build()
        .map_err(|e| DispatchError::Transport(format!("failed to build HTTP client: {e}")))
}

fn route_key(url: &Url) -> String {
    format!(
        "{}://{}:{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

async fn send(client: &reqwest::Client, request: &HttpRequest) -> reqwest::Result<RawResponse> {
    let mut builder = client.request(request.method.clone(), request.url.clone());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some((username, password)) = &request.basic_auth {
        builder = builder.basic_auth(username, Some(password));
    }
    let response = builder.body(request.body.clone()).send().await?;

    let status = response.status();
    let body = if has_no_entity(status) {
        None
    } else {
        Some(response.text().await?)
    };
    Ok(RawResponse {
        status: status.as_u16(),
        body,
    })
}

fn has_no_entity(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED
    )
}

/// Finds a [`DispatchError`] raised by the DNS hook somewhere in the chain.
fn dispatch_cause(error: &reqwest::Error) -> Option<DispatchError> {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(cause) = source {
        if let Some(dispatch) = cause.downcast_ref::<DispatchError>() {
            return Some(dispatch.clone());
        }
        source = cause.source();
    }
    None
}

fn classify(error: reqwest::Error) -> DispatchError {
    if let Some(cause) = dispatch_cause(&error) {
        return cause;
    }
    if error.is_timeout() {
        return DispatchError::Transport(format!("request timed out: {error}"));
    }
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    DispatchError::Transport(message)
}
