use super::{wrong_type, DestinationFactory};
use crate::core::{DestinationResponse, DestinationType, PublishReceipt, TopicClient, TopicClientFactory};
use crate::credentials::CredentialChain;
use crate::error::{DispatchError, Result};
use crate::message::{Message, SnsMessage, TopicAuth};
use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::config::{BehaviorVersion, Region};
use aws_sdk_sns::error::DisplayErrorContext;
use moka::future::Cache;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const TOPIC_CLIENT_CACHE_CAPACITY: u64 = 10_000;

/// Identifies a topic client: one per credential identity and region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicClientKey {
    pub auth: TopicAuth,
    pub region: String,
}

impl TopicClientKey {
    pub fn for_message(message: &SnsMessage) -> Self {
        Self {
            auth: message.auth().clone(),
            region: message.region().to_string(),
        }
    }
}

/// Publishes to pub/sub topics.
///
/// Topic clients are cached per [`TopicClientKey`]. Concurrent publishes that
/// miss on the same key wait on a single construction.
pub struct SnsDestinationFactory {
    chain: CredentialChain,
    client_factory: Arc<dyn TopicClientFactory>,
    clients: Cache<TopicClientKey, Arc<dyn TopicClient>>,
}

impl SnsDestinationFactory {
    pub fn new(chain: CredentialChain, client_factory: Arc<dyn TopicClientFactory>) -> Self {
        Self {
            chain,
            client_factory,
            clients: Cache::builder()
                .max_capacity(TOPIC_CLIENT_CACHE_CAPACITY)
                .build(),
        }
    }

    /// Returns the cached client for the message's key, building it on a miss.
    pub async fn get_client(&self, message: &SnsMessage) -> Result<Arc<dyn TopicClient>> {
        let key = TopicClientKey::for_message(message);
        let region = key.region.clone();
        self.clients
            .try_get_with(key, async {
                let credentials = self.chain.provider_for(message.auth()).await?;
                info!(region = %region, "Building topic client");
                metrics::counter!("topic_clients_built_total").increment(1);
                Ok::<_, DispatchError>(self.client_factory.build(&region, credentials))
            })
            .await
            .map_err(|e| DispatchError::clone(&e))
    }

    /// Number of cached topic clients.
    pub async fn cached_clients(&self) -> u64 {
        self.clients.run_pending_tasks().await;
        self.clients.entry_count()
    }
}

#[async_trait]
impl DestinationFactory for SnsDestinationFactory {
    fn destination_type(&self) -> DestinationType {
        DestinationType::Sns
    }

    #[instrument(skip_all, fields(topic_arn = tracing::field::Empty))]
    async fn publish(&self, message: &Message) -> Result<DestinationResponse> {
        let Message::Sns(message) = message else {
            return Err(wrong_type(DestinationType::Sns));
        };
        tracing::Span::current().record("topic_arn", message.topic_arn());

        let client = self.get_client(message).await?;
        let receipt = client
            .publish(message.topic_arn(), message.content(), message.subject())
            .await?;
        if receipt.message_id.is_empty() {
            return Err(DispatchError::Publish(
                "MessageId is missing in the response".to_string(),
            ));
        }

        debug!(message_id = %receipt.message_id, "Topic accepted the message");
        Ok(DestinationResponse::new(receipt.status_code, receipt.message_id))
    }
}

/// Builds SDK-backed topic clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdkTopicClientFactory;

impl TopicClientFactory for SdkTopicClientFactory {
    fn build(&self, region: &str, credentials: SharedCredentialsProvider) -> Arc<dyn TopicClient> {
        let config = aws_sdk_sns::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .build();
        Arc::new(SnsTopicClient {
            client: aws_sdk_sns::Client::from_conf(config),
        })
    }
}

/// A topic client over the AWS SDK.
pub struct SnsTopicClient {
    client: aws_sdk_sns::Client,
}

#[async_trait]
impl TopicClient for SnsTopicClient {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<PublishReceipt> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .set_subject(subject.map(str::to_string))
            .send()
            .await
            .map_err(|e| DispatchError::Publish(DisplayErrorContext(&e).to_string()))?;

        // The SDK only yields output for a 2xx answer.
        Ok(PublishReceipt {
            message_id: output.message_id().unwrap_or_default().to_string(),
            status_code: 200,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticKeySource;
    use crate::test_utils::{FakeCredentialSource, RecordingTopicClientFactory};

    const TOPIC_WEST: &str = "arn:aws:sns:us-west-2:012345678912:alerts";
    const TOPIC_EAST: &str = "arn:aws:sns:us-east-1:012345678912:alerts";

    fn message(topic: &str, role: &str) -> Message {
        SnsMessage::builder("ops")
            .with_content("disk full")
            .with_topic_arn(topic)
            .with_role(role)
            .with_subject("Disk")
            .build()
            .unwrap()
            .into()
    }

    fn factory(clients: Arc<RecordingTopicClientFactory>) -> SnsDestinationFactory {
        let chain = CredentialChain::new(vec![
            Arc::new(FakeCredentialSource::with_keys("fake", "a", "b")),
            Arc::new(StaticKeySource),
        ]);
        SnsDestinationFactory::new(chain, clients)
    }

    #[tokio::test]
    async fn test_publish_reports_message_id_and_status() {
        // Arrange
        let clients = Arc::new(RecordingTopicClientFactory::new());
        let factory = factory(clients.clone());

        // Act
        let response = factory
            .publish(&message(TOPIC_WEST, "arn:aws:iam::012345678912:role/a"))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.content(), "message-1");
        let published = clients.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic_arn, TOPIC_WEST);
        assert_eq!(published[0].subject.as_deref(), Some("Disk"));
        assert_eq!(clients.built_regions(), vec!["us-west-2".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_message_id_is_a_publish_failure() {
        let clients = Arc::new(RecordingTopicClientFactory::new().with_message_id(""));
        let factory = factory(clients);

        let err = factory
            .publish(&message(TOPIC_WEST, "arn:aws:iam::012345678912:role/a"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Publish("MessageId is missing in the response".to_string())
        );
    }

    #[tokio::test]
    async fn test_rejects_foreign_message() {
        let factory = factory(Arc::new(RecordingTopicClientFactory::new()));
        let slack: Message = crate::message::ChatMessage::slack("x")
            .with_url("https://hooks.slack.com/x")
            .with_content("hi")
            .build()
            .unwrap()
            .into();

        let err = factory.publish(&slack).await.unwrap_err();

        assert_eq!(err.to_string(), "Channel Type does not match SNS");
    }

    #[tokio::test]
    async fn test_credentials_unavailable_propagates() {
        let chain = CredentialChain::new(vec![Arc::new(FakeCredentialSource::empty("none"))]);
        let clients = Arc::new(RecordingTopicClientFactory::new());
        let factory = SnsDestinationFactory::new(chain, clients.clone());

        let err = factory
            .publish(&message(TOPIC_EAST, "arn:aws:iam::012345678912:role/a"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::CredentialsUnavailable(_)));
        assert_eq!(clients.build_count(), 0);
    }
}
