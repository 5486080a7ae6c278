//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged over
//! the configuration file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Delivers one notification to an SNS topic, chat webhook, custom webhook or mail server.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to a JSON destination request. Reads stdin when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub message: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Region for STS role assumption.
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Timeout for DNS resolution in milliseconds.
    #[arg(long, value_name = "MS")]
    pub dns_timeout_ms: Option<u64>,

    /// Address of the DNS resolver to use, as ip:port.
    #[arg(long, value_name = "ADDR")]
    pub dns_resolver: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut dns = Dict::new();
        if let Some(resolver) = &self.dns_resolver {
            dns.insert("resolver".into(), Value::from(resolver.clone()));
        }
        if let Some(timeout) = self.dns_timeout_ms {
            dns.insert("timeout_ms".into(), Value::from(timeout));
        }
        if !dns.is_empty() {
            dict.insert("dns".into(), Value::from(dns));
        }

        if let Some(region) = &self.region {
            let mut credentials = Dict::new();
            credentials.insert("region".into(), Value::from(region.clone()));
            dict.insert("credentials".into(), Value::from(credentials));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
