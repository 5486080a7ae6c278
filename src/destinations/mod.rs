//! Destination factories and the registry that dispatches to them.
//!
//! A factory owns whatever client state its channel needs (topic clients,
//! the shared HTTP transport, SMTP settings) and turns a [`Message`] into a
//! [`DestinationResponse`]. The registry maps each destination type to the one
//! factory that serves it.

mod chat;
mod mail;
mod sns;
mod webhook;

pub use chat::ChatWebhookFactory;
pub use mail::{MailFactory, SmtpMailSender, MAIL_FAILED_STATUS, MAIL_SENT_STATUS};
pub use sns::{SdkTopicClientFactory, SnsDestinationFactory, SnsTopicClient, TopicClientKey};
pub use webhook::CustomWebhookFactory;

use crate::core::{DestinationResponse, DestinationType};
use crate::error::{DispatchError, Result};
use crate::message::Message;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Delivers messages of one destination type.
#[async_trait]
pub trait DestinationFactory: Send + Sync {
    fn destination_type(&self) -> DestinationType;

    async fn publish(&self, message: &Message) -> Result<DestinationResponse>;
}

/// Looks up the factory for a destination type.
pub struct DestinationRegistry {
    factories: ArcSwap<HashMap<DestinationType, Arc<dyn DestinationFactory>>>,
}

impl DestinationRegistry {
    /// Registers each factory under its own type. Later entries replace earlier ones.
    pub fn from_factories(factories: Vec<Arc<dyn DestinationFactory>>) -> Self {
        let map: HashMap<_, _> = factories
            .into_iter()
            .map(|f| (f.destination_type(), f))
            .collect();
        Self {
            factories: ArcSwap::from_pointee(map),
        }
    }

    pub fn resolve(&self, destination_type: DestinationType) -> Result<Arc<dyn DestinationFactory>> {
        self.factories
            .load()
            .get(&destination_type)
            .cloned()
            .ok_or_else(|| DispatchError::UnsupportedDestination(destination_type.to_string()))
    }

    /// The registered destination types, in a stable order.
    pub fn destination_types(&self) -> Vec<DestinationType> {
        let mut types: Vec<_> = self.factories.load().keys().copied().collect();
        types.sort();
        types
    }

    /// Resolves the factory for the message and publishes through it.
    #[instrument(skip(self, message), fields(destination = %message.destination_type(), name = message.destination_name()))]
    pub async fn publish(&self, message: &Message) -> Result<DestinationResponse> {
        let start = Instant::now();
        let destination = message.destination_type().as_str();

        let result = match self.resolve(message.destination_type()) {
            Ok(factory) => factory.publish(message).await,
            Err(e) => Err(e),
        };

        metrics::histogram!("dispatch_publish_duration_seconds", "destination" => destination)
            .record(start.elapsed().as_secs_f64());
        match &result {
            Ok(response) => {
                info!(status = response.status_code(), "Message published");
                metrics::counter!("dispatch_publish_total", "destination" => destination, "status" => "success")
                    .increment(1);
            }
            Err(e) => {
                error!(details = %message, error = %e, kind = e.kind(), "Exception publishing message");
                metrics::counter!("dispatch_publish_total", "destination" => destination, "status" => e.kind())
                    .increment(1);
            }
        }
        result
    }

    /// Replaces the factory registered for `destination_type`.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn override_factory(
        &self,
        destination_type: DestinationType,
        factory: Arc<dyn DestinationFactory>,
    ) {
        self.factories.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(destination_type, factory.clone());
            next
        });
    }
}

/// The variant mismatch every factory reports for a foreign message.
fn wrong_type(expected: DestinationType) -> DispatchError {
    DispatchError::validation(format!("Channel Type does not match {}", expected.label()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;
    use crate::test_utils::StaticDestinationFactory;

    fn slack_message() -> Message {
        ChatMessage::slack("alerts")
            .with_url("https://hooks.slack.com/services/x")
            .with_content("hi")
            .build()
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_unregistered_type_is_unsupported() {
        let registry = DestinationRegistry::from_factories(vec![]);

        let err = registry.publish(&slack_message()).await.unwrap_err();

        assert_eq!(err, DispatchError::UnsupportedDestination("slack".to_string()));
        assert!(err.is_bad_request());
    }

    #[tokio::test]
    async fn test_override_replaces_factory() {
        // Arrange
        let registry = DestinationRegistry::from_factories(vec![Arc::new(
            StaticDestinationFactory::new(DestinationType::Slack, 500, "initial"),
        )]);

        // Act
        registry.override_factory(
            DestinationType::Slack,
            Arc::new(StaticDestinationFactory::new(DestinationType::Slack, 200, "override")),
        );
        let response = registry.publish(&slack_message()).await.unwrap();

        // Assert
        assert_eq!(response.content(), "override");
        assert_eq!(registry.destination_types(), vec![DestinationType::Slack]);
    }
}
