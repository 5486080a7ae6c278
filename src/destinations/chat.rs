use super::{wrong_type, DestinationFactory};
use crate::core::{DestinationResponse, DestinationType};
use crate::error::Result;
use crate::message::{ChatMessage, Message};
use crate::transport::{HttpRequest, HttpTransport};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use tracing::instrument;

/// Posts the message content to a Slack or Chime incoming webhook.
pub struct ChatWebhookFactory {
    destination_type: DestinationType,
    transport: Arc<HttpTransport>,
}

impl ChatWebhookFactory {
    pub fn slack(transport: Arc<HttpTransport>) -> Self {
        Self {
            destination_type: DestinationType::Slack,
            transport,
        }
    }

    pub fn chime(transport: Arc<HttpTransport>) -> Self {
        Self {
            destination_type: DestinationType::Chime,
            transport,
        }
    }

    pub fn get_client(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    pub fn build_request(message: &ChatMessage) -> HttpRequest {
        HttpRequest::new(Method::POST, message.url().clone())
            .with_header("Content-Type", "application/json")
            .with_body(message.content())
    }
}

#[async_trait]
impl DestinationFactory for ChatWebhookFactory {
    fn destination_type(&self) -> DestinationType {
        self.destination_type
    }

    #[instrument(skip_all, fields(destination = %self.destination_type))]
    async fn publish(&self, message: &Message) -> Result<DestinationResponse> {
        let chat = match (self.destination_type, message) {
            (DestinationType::Slack, Message::Slack(chat)) => chat,
            (DestinationType::Chime, Message::Chime(chat)) => chat,
            _ => return Err(wrong_type(self.destination_type)),
        };
        self.transport.execute(Self::build_request(chat)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeHostResolver, RecordingHttpExecutor};
    use crate::transport::IpBlocklist;

    fn transport(executor: Arc<RecordingHttpExecutor>) -> Arc<HttpTransport> {
        let resolver = FakeHostResolver::new().with_host("hooks.chime.aws", &["52.94.0.10"]);
        Arc::new(HttpTransport::with_executor(
            executor,
            Arc::new(resolver),
            Arc::new(IpBlocklist::default()),
        ))
    }

    #[tokio::test]
    async fn test_posts_content_to_webhook_url() {
        // Arrange
        let executor = Arc::new(RecordingHttpExecutor::responding(200, Some("")));
        let factory = ChatWebhookFactory::chime(transport(executor.clone()));
        let message: Message = ChatMessage::chime("team")
            .with_url("https://hooks.chime.aws/incomingwebhooks/abc?token=x")
            .with_content("{\"Content\":\"disk full\"}")
            .build()
            .unwrap()
            .into();

        // Act
        let response = factory.publish(&message).await.unwrap();

        // Assert
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.content(), "");
        let requests = executor.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].url.as_str(),
            "https://hooks.chime.aws/incomingwebhooks/abc?token=x"
        );
        assert_eq!(requests[0].body, "{\"Content\":\"disk full\"}");
    }

    #[tokio::test]
    async fn test_slack_factory_rejects_chime_message() {
        let executor = Arc::new(RecordingHttpExecutor::responding(200, None));
        let factory = ChatWebhookFactory::slack(transport(executor.clone()));
        let message: Message = ChatMessage::chime("team")
            .with_url("https://hooks.chime.aws/x")
            .with_content("hi")
            .build()
            .unwrap()
            .into();

        let err = factory.publish(&message).await.unwrap_err();

        assert_eq!(err.to_string(), "Channel Type does not match Slack");
        assert!(executor.requests().is_empty());
    }
}
