//! Wiring of one dispatch context from configuration.
//!
//! A [`DispatchContext`] owns the shared transport, the credential caches and
//! the destination registry. Every network collaborator can be replaced
//! through [`DispatchContextBuilder`] before `build`.

use crate::config::Config;
use crate::core::{
    CredentialSource, DestinationResponse, DestinationType, HostResolver, HttpExecutor, MailSender,
    TopicClientFactory,
};
use crate::credentials::{
    sts_endpoint, AssumeRoleSource, CredentialCache, CredentialChain, InternalAuthClient,
};
use crate::destinations::{
    ChatWebhookFactory, CustomWebhookFactory, DestinationFactory, DestinationRegistry,
    MailFactory, SdkTopicClientFactory, SmtpMailSender, SnsDestinationFactory,
};
use crate::error::Result as DispatchResult;
use crate::message::{DestinationRequest, Message};
use crate::transport::{HickoryHostResolver, HttpTransport, IpBlocklist};
use anyhow::Result;
use aws_config::meta::region::RegionProviderChain;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds a [`DispatchContext`], with optional overrides for testing.
pub struct DispatchContextBuilder {
    config: Config,
    resolver_override: Option<Arc<dyn HostResolver>>,
    executor_override: Option<Arc<dyn HttpExecutor>>,
    topic_client_factory_override: Option<Arc<dyn TopicClientFactory>>,
    mail_sender_override: Option<Arc<dyn MailSender>>,
    credential_sources_override: Option<Vec<Arc<dyn CredentialSource>>>,
}

impl DispatchContextBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            resolver_override: None,
            executor_override: None,
            topic_client_factory_override: None,
            mail_sender_override: None,
            credential_sources_override: None,
        }
    }

    /// Overrides the DNS resolver used for destination checks and connections.
    pub fn resolver_override(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver_override = Some(resolver);
        self
    }

    /// Sends HTTP requests through `executor` instead of the connection pool.
    pub fn executor_override(mut self, executor: Arc<dyn HttpExecutor>) -> Self {
        self.executor_override = Some(executor);
        self
    }

    pub fn topic_client_factory_override(mut self, factory: Arc<dyn TopicClientFactory>) -> Self {
        self.topic_client_factory_override = Some(factory);
        self
    }

    pub fn mail_sender_override(mut self, sender: Arc<dyn MailSender>) -> Self {
        self.mail_sender_override = Some(sender);
        self
    }

    /// Replaces the whole credential chain.
    pub fn credential_sources_override(mut self, sources: Vec<Arc<dyn CredentialSource>>) -> Self {
        self.credential_sources_override = Some(sources);
        self
    }

    /// Builds the context. Must run inside a Tokio runtime.
    pub async fn build(self) -> Result<DispatchContext> {
        let config = self.config;
        let enabled = &config.destinations;

        let resolver: Arc<dyn HostResolver> = match self.resolver_override {
            Some(resolver) => resolver,
            None => {
                let (resolver, nameservers) = HickoryHostResolver::from_config(&config.dns)?;
                match &config.dns.resolver {
                    Some(addr) => info!(resolver = %addr, "Using configured DNS resolver"),
                    None => info!(?nameservers, "Using system DNS resolvers"),
                }
                Arc::new(resolver)
            }
        };
        let blocklist = Arc::new(IpBlocklist::new(config.transport.blocked_ranges.clone()));
        let transport = Arc::new(match self.executor_override {
            Some(executor) => HttpTransport::with_executor(executor, resolver, blocklist),
            None => HttpTransport::pooled(config.transport.clone(), resolver, blocklist)?,
        });

        let mut factories: Vec<Arc<dyn DestinationFactory>> = Vec::new();
        if enabled.is_enabled(DestinationType::Sns) {
            let chain = match self.credential_sources_override {
                Some(sources) => CredentialChain::new(sources),
                None => standard_chain(&config).await?,
            };
            let clients = self
                .topic_client_factory_override
                .unwrap_or_else(|| Arc::new(SdkTopicClientFactory));
            factories.push(Arc::new(SnsDestinationFactory::new(chain, clients)));
        }
        if enabled.is_enabled(DestinationType::Chime) {
            factories.push(Arc::new(ChatWebhookFactory::chime(transport.clone())));
        }
        if enabled.is_enabled(DestinationType::Slack) {
            factories.push(Arc::new(ChatWebhookFactory::slack(transport.clone())));
        }
        if enabled.is_enabled(DestinationType::CustomWebhook) {
            factories.push(Arc::new(CustomWebhookFactory::new(transport.clone())));
        }
        if enabled.is_enabled(DestinationType::Mail) {
            let sender = self
                .mail_sender_override
                .unwrap_or_else(|| Arc::new(SmtpMailSender::new(config.mail.timeout())));
            factories.push(Arc::new(MailFactory::new(sender)));
        }

        let registry = DestinationRegistry::from_factories(factories);
        info!(destinations = ?registry.destination_types(), "Dispatch context ready");
        Ok(DispatchContext {
            config,
            registry,
            transport,
        })
    }
}

/// Internal auth, then STS in the configured or discovered region, then static keys.
async fn standard_chain(config: &Config) -> Result<CredentialChain> {
    let settings = &config.credentials;
    let region = match &settings.region {
        Some(region) => Some(region.clone()),
        None => {
            let discovered = RegionProviderChain::default_provider().region().await;
            if discovered.is_none() {
                warn!("No region configured or discovered, using the global STS endpoint");
            }
            discovered.map(|r| r.to_string())
        }
    };

    let internal_auth = InternalAuthClient::from_config(settings)?;
    info!(endpoint = %internal_auth.endpoint(), "Internal auth client configured");
    let base = Arc::new(CredentialCache::with_buffer(
        "internal-auth",
        Arc::new(internal_auth),
        settings.expiry_buffer(),
    ));
    let assume_role = AssumeRoleSource::new(
        base,
        sts_endpoint(region.as_deref()),
        settings.session_name.clone(),
        settings.expiry_buffer(),
    );
    Ok(CredentialChain::standard(assume_role))
}

/// Everything needed to deliver notifications, shared by handle.
pub struct DispatchContext {
    config: Config,
    registry: DestinationRegistry,
    transport: Arc<HttpTransport>,
}

impl DispatchContext {
    pub fn builder(config: Config) -> DispatchContextBuilder {
        DispatchContextBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &DestinationRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    pub async fn publish(&self, message: &Message) -> DispatchResult<DestinationResponse> {
        self.registry.publish(message).await
    }

    /// Validates the request through the builders, then publishes it.
    pub async fn publish_request(
        &self,
        request: DestinationRequest,
    ) -> DispatchResult<DestinationResponse> {
        let message = request.into_message()?;
        self.publish(&message).await
    }

    /// Stops the transport's background work.
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}
