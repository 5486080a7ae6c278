use super::{wrong_type, DestinationFactory};
use crate::core::{DestinationResponse, DestinationType};
use crate::error::Result;
use crate::message::{CustomWebhookMessage, Message};
use crate::transport::{HttpRequest, HttpTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Sends the message to a generic webhook with the caller's method and headers.
pub struct CustomWebhookFactory {
    transport: Arc<HttpTransport>,
}

impl CustomWebhookFactory {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    pub fn get_client(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    /// Caller headers replace the default JSON content type entirely.
    pub fn build_request(message: &CustomWebhookMessage) -> HttpRequest {
        let mut request = HttpRequest::new(message.method().clone(), message.url().clone())
            .with_body(message.content());
        if message.header_params().is_empty() {
            request = request.with_header("Content-Type", "application/json");
        } else {
            for (name, value) in message.header_params() {
                request = request.with_header(name.as_str(), value.as_str());
            }
        }
        request.basic_auth = message
            .basic_auth()
            .map(|(user, password)| (user.to_string(), password.to_string()));
        request
    }
}

#[async_trait]
impl DestinationFactory for CustomWebhookFactory {
    fn destination_type(&self) -> DestinationType {
        DestinationType::CustomWebhook
    }

    #[instrument(skip_all)]
    async fn publish(&self, message: &Message) -> Result<DestinationResponse> {
        let Message::CustomWebhook(webhook) = message else {
            return Err(wrong_type(DestinationType::CustomWebhook));
        };
        self.transport.execute(Self::build_request(webhook)).await
    }
}
