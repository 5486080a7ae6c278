//! Configuration management for alertdispatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all dispatch settings. It uses the `figment`
//! crate to layer defaults, an optional TOML file, `ALERTDISPATCH_`
//! environment variables and command-line arguments.

use crate::cli::Cli;
use crate::core::DestinationType;
use crate::transport::default_blocked_ranges;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// The logging level, used when `RUST_LOG` is not set.
    pub log_level: String,
    /// The shared HTTP connection pool.
    pub transport: TransportConfig,
    /// DNS resolution for outbound hosts.
    pub dns: DnsConfig,
    /// Base credentials and role assumption.
    pub credentials: CredentialsConfig,
    /// SMTP delivery.
    pub mail: MailConfig,
    /// Which destination factories are registered.
    pub destinations: DestinationsConfig,
}

/// Configuration for the pooled HTTP transport.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound on concurrent requests across all routes.
    pub max_connections: usize,
    /// Upper bound on concurrent requests to one scheme, host and port.
    pub max_connections_per_route: usize,
    pub connect_timeout_ms: u64,
    /// Socket read timeout.
    pub read_timeout_ms: u64,
    /// Total connection attempts per request, including the first.
    pub connect_attempts: u32,
    /// How often the eviction task runs.
    pub eviction_interval_secs: u64,
    /// Routes idle at least this long are evicted.
    pub idle_timeout_secs: u64,
    /// Destination address ranges that are never contacted.
    pub blocked_ranges: Vec<IpNetwork>,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Never shorter than one second.
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_connections: 60,
            max_connections_per_route: 20,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 50_000,
            connect_attempts: 3,
            eviction_interval_secs: 60,
            idle_timeout_secs: 60,
            blocked_ranges: default_blocked_ranges(),
        }
    }
}

/// Configuration for DNS resolution.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DnsConfig {
    /// `ip:port` of a specific name server. The system configuration is used when unset.
    pub resolver: Option<String>,
    /// Per-query timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            resolver: None,
            timeout_ms: 5_000,
        }
    }
}

/// Configuration for the internal-auth service and STS role assumption.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub internal_auth_host: String,
    pub internal_auth_port: u16,
    /// Policy the internal-auth service issues credentials for.
    pub policy_id: String,
    /// Region for the STS endpoint. Discovered from the environment when unset.
    pub region: Option<String>,
    /// Session name for assumed roles.
    pub session_name: String,
    /// Cached credentials are refreshed this long before they expire.
    pub expiry_buffer_secs: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl CredentialsConfig {
    pub fn expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.expiry_buffer_secs)
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            internal_auth_host: "localhost".to_string(),
            internal_auth_port: 9200,
            policy_id: "AR".to_string(),
            region: None,
            session_name: "alerting-notification".to_string(),
            expiry_buffer_secs: 10,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 70_000,
        }
    }
}

/// Configuration for SMTP delivery.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MailConfig {
    /// Timeout for each SMTP command.
    pub timeout_secs: u64,
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Configuration for the destination registry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DestinationsConfig {
    pub enabled: Vec<DestinationType>,
}

impl DestinationsConfig {
    pub fn is_enabled(&self, destination_type: DestinationType) -> bool {
        self.enabled.contains(&destination_type)
    }
}

impl Default for DestinationsConfig {
    fn default() -> Self {
        Self {
            enabled: DestinationType::ALL.to_vec(),
        }
    }
}

impl Config {
    /// Loads the configuration by layering defaults, the optional TOML file
    /// named on the command line, the environment and the CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            // e.g. ALERTDISPATCH_TRANSPORT__MAX_CONNECTIONS=100
            .merge(Env::prefixed("ALERTDISPATCH_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            transport: TransportConfig::default(),
            dns: DnsConfig::default(),
            credentials: CredentialsConfig::default(),
            mail: MailConfig::default(),
            destinations: DestinationsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.transport.max_connections, 60);
        assert_eq!(config.transport.max_connections_per_route, 20);
        assert_eq!(config.transport.connect_attempts, 3);
        assert_eq!(config.transport.blocked_ranges.len(), default_blocked_ranges().len());
        assert_eq!(config.credentials.policy_id, "AR");
        assert_eq!(config.destinations.enabled.len(), 5);
    }

    #[test]
    fn test_eviction_interval_has_floor() {
        let config = TransportConfig {
            eviction_interval_secs: 0,
            ..Default::default()
        };

        assert_eq!(config.eviction_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ALERTDISPATCH_TRANSPORT__MAX_CONNECTIONS", "7");
            jail.set_env("ALERTDISPATCH_CREDENTIALS__POLICY_ID", "RO");

            let config = Config::load(&Cli::default()).map_err(|e| e.to_string())?;

            assert_eq!(config.transport.max_connections, 7);
            assert_eq!(config.credentials.policy_id, "RO");
            Ok(())
        });
    }
}
