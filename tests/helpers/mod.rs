//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use alertdispatch::config::{Config, DestinationsConfig, TransportConfig};
use alertdispatch::context::DispatchContext;
use alertdispatch::test_utils::{FakeHostResolver, RecordingMailSender};
use alertdispatch::transport::{HttpTransport, IpBlocklist};
use alertdispatch::DestinationType;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;

pub const ROLE_ARN: &str = "arn:aws:iam::012345678912:role/alerting";
pub const TOPIC_WEST: &str = "arn:aws:sns:us-west-2:012345678912:alerts";
pub const TOPIC_EAST: &str = "arn:aws:sns:us-east-1:012345678912:alerts";

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("alertdispatch=debug"))
        .with_test_writer()
        .try_init();
}

/// A configuration that allows loopback destinations, so wiremock is reachable.
pub fn loopback_config(enabled: Vec<DestinationType>) -> Config {
    Config {
        transport: TransportConfig {
            blocked_ranges: vec![],
            ..Default::default()
        },
        destinations: DestinationsConfig { enabled },
        ..Default::default()
    }
}

/// A context over the real connection pool, with DNS answered by `resolver`.
pub async fn http_context(resolver: FakeHostResolver, enabled: Vec<DestinationType>) -> DispatchContext {
    DispatchContext::builder(loopback_config(enabled))
        .resolver_override(Arc::new(resolver))
        .mail_sender_override(Arc::new(RecordingMailSender::new()))
        .build()
        .await
        .unwrap()
}

/// A pooled transport with the given blocklist.
pub fn pooled_transport(resolver: FakeHostResolver, blocklist: IpBlocklist) -> HttpTransport {
    HttpTransport::pooled(TransportConfig::default(), Arc::new(resolver), Arc::new(blocklist)).unwrap()
}

/// The port wiremock listens on.
pub fn port_of(server: &MockServer) -> u16 {
    server.address().port()
}
