use super::blocklist::IpBlocklist;
use crate::config::DnsConfig;
use crate::core::HostResolver;
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::xfer::Protocol,
    system_conf, TokioResolver,
};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{trace, warn};

/// Host resolver backed by hickory.
pub struct HickoryHostResolver {
    resolver: TokioResolver,
}

impl HickoryHostResolver {
    /// Creates a resolver from the DNS section of the configuration.
    ///
    /// Returns the resolver and the name servers it will query.
    pub fn from_config(config: &DnsConfig) -> anyhow::Result<(Self, Vec<SocketAddr>)> {
        let resolver_config = if let Some(resolver_addr_str) = &config.resolver {
            let mut custom_config = ResolverConfig::new();
            let socket_addr: SocketAddr = resolver_addr_str.parse()?;
            custom_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
            custom_config
        } else {
            let (system_config, _) = system_conf::read_system_conf()?;
            if system_config.name_servers().is_empty() {
                warn!("No system DNS servers found, falling back to Cloudflare DNS.");
                ResolverConfig::cloudflare()
            } else {
                system_config
            }
        };

        let mut nameservers: Vec<_> = resolver_config
            .name_servers()
            .iter()
            .map(|ns| ns.socket_addr)
            .collect();
        nameservers.sort();
        nameservers.dedup();

        let mut resolver_opts = ResolverOpts::default();
        resolver_opts.timeout = Duration::from_millis(config.timeout_ms);

        let resolver = hickory_resolver::Resolver::builder_with_config(
            resolver_config,
            TokioConnectionProvider::default(),
        )
        .with_options(resolver_opts)
        .build();

        Ok((Self { resolver }, nameservers))
    }
}

#[async_trait]
impl HostResolver for HickoryHostResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let start_time = Instant::now();
        let lookup = self.resolver.lookup_ip(host).await;
        metrics::histogram!("dns_resolution_duration_seconds")
            .record(start_time.elapsed().as_secs_f64());

        match lookup {
            Ok(lookup) => {
                let ips: Vec<IpAddr> = lookup.iter().collect();
                if ips.is_empty() {
                    return Err(DispatchError::Resolution(format!("{host}: no addresses")));
                }
                trace!(host, count = ips.len(), "Resolved destination host");
                Ok(ips)
            }
            Err(e) => Err(DispatchError::Resolution(format!("{host}: {e}"))),
        }
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The HTTP client's DNS hook.
///
/// Every address a connection could use is checked against the blocklist, so
/// the address that gets connected is the address that was checked.
#[derive(Clone)]
pub struct GuardedResolver {
    inner: Arc<dyn HostResolver>,
    blocklist: Arc<IpBlocklist>,
}

impl GuardedResolver {
    pub fn new(inner: Arc<dyn HostResolver>, blocklist: Arc<IpBlocklist>) -> Self {
        Self { inner, blocklist }
    }

    pub fn blocklist(&self) -> &IpBlocklist {
        &self.blocklist
    }

    /// Resolves `host` and fails if any of its addresses is blocked.
    pub async fn resolve_checked(&self, host: &str) -> Result<Vec<IpAddr>> {
        let ips = self.inner.resolve(host).await?;
        if ips.is_empty() {
            return Err(DispatchError::Resolution(format!("{host}: no addresses")));
        }
        for ip in &ips {
            self.blocklist.check(host, *ip)?;
        }
        Ok(ips)
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let this = self.clone();
        Box::pin(async move {
            let ips = this
                .resolve_checked(name.as_str())
                .await
                .map_err(|e| Box::new(e) as BoxError)?;
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok::<Addrs, BoxError>(addrs)
        })
    }
}
