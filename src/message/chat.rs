use super::{or_null, require_content, require_name, require_type};
use crate::core::DestinationType;
use crate::error::{DispatchError, Result};
use reqwest::Url;

/// A message for a simple-URL chat webhook (Slack or Chime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    destination_type: DestinationType,
    destination_name: String,
    content: String,
    url: Url,
}

impl ChatMessage {
    pub fn slack(destination_name: impl Into<String>) -> ChatMessageBuilder {
        ChatMessageBuilder::new(DestinationType::Slack, destination_name.into())
    }

    pub fn chime(destination_name: impl Into<String>) -> ChatMessageBuilder {
        ChatMessageBuilder::new(DestinationType::Chime, destination_name.into())
    }

    pub fn destination_type(&self) -> DestinationType {
        self.destination_type
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessageBuilder {
    expected: DestinationType,
    destination_type: DestinationType,
    destination_name: String,
    content: Option<String>,
    url: Option<String>,
}

impl ChatMessageBuilder {
    fn new(destination_type: DestinationType, destination_name: String) -> Self {
        Self {
            expected: destination_type,
            destination_type,
            destination_name,
            content: None,
            url: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_type(mut self, destination_type: DestinationType) -> Self {
        self.destination_type = destination_type;
        self
    }

    pub fn build(self) -> Result<ChatMessage> {
        require_name(&self.destination_name)?;
        require_type(self.destination_type, self.expected)?;

        let raw_url = match &self.url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => {
                return Err(DispatchError::validation(format!(
                    "Fully qualified URL is missing/invalid: {}",
                    or_null(&self.url)
                )))
            }
        };
        let content = require_content(self.content.as_deref())?.to_string();

        let url = Url::parse(&raw_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .ok_or_else(|| {
                DispatchError::validation(format!(
                    "Fully qualified URL is missing/invalid: {raw_url}"
                ))
            })?;

        Ok(ChatMessage {
            destination_type: self.destination_type,
            destination_name: self.destination_name,
            content,
            url,
        })
    }
}
