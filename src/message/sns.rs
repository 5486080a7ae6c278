use super::arn::{is_valid_iam_arn, is_valid_sns_arn, region_from_topic_arn};
use super::{has_text, or_null, require_content, require_name, require_type};
use crate::core::DestinationType;
use crate::error::{DispatchError, Result};
use std::fmt;

/// How a topic publish authenticates.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TopicAuth {
    /// Assume this role through the internal-auth base credentials.
    Role(String),
    /// Use a caller-supplied IAM user key pair directly.
    IamKeys { access_key: String, secret_key: String },
}

impl fmt::Debug for TopicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicAuth::Role(arn) => f.debug_tuple("Role").field(arn).finish(),
            TopicAuth::IamKeys { access_key, .. } => f
                .debug_struct("IamKeys")
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .finish(),
        }
    }
}

/// A message for a pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnsMessage {
    destination_name: String,
    content: String,
    topic_arn: String,
    region: String,
    auth: TopicAuth,
    subject: Option<String>,
}

impl SnsMessage {
    pub fn builder(destination_name: impl Into<String>) -> SnsMessageBuilder {
        SnsMessageBuilder {
            destination_type: DestinationType::Sns,
            destination_name: destination_name.into(),
            content: None,
            topic_arn: None,
            role_arn: None,
            access_key: None,
            secret_key: None,
            subject: None,
        }
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    /// The region segment of the topic ARN.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn auth(&self) -> &TopicAuth {
        &self.auth
    }

    /// The subject, only when one was supplied and is non-empty.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct SnsMessageBuilder {
    destination_type: DestinationType,
    destination_name: String,
    content: Option<String>,
    topic_arn: Option<String>,
    role_arn: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    subject: Option<String>,
}

impl SnsMessageBuilder {
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_topic_arn(mut self, topic_arn: impl Into<String>) -> Self {
        self.topic_arn = Some(topic_arn.into());
        self
    }

    pub fn with_role(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    pub fn with_iam_keys(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_type(mut self, destination_type: DestinationType) -> Self {
        self.destination_type = destination_type;
        self
    }

    pub fn build(self) -> Result<SnsMessage> {
        require_name(&self.destination_name)?;
        require_type(self.destination_type, DestinationType::Sns)?;
        let content = require_content(self.content.as_deref())?.to_string();

        let topic_arn = match self.topic_arn {
            Some(arn) if !arn.is_empty() => arn,
            _ => {
                return Err(DispatchError::validation(
                    "Topic arn is missing/invalid: null",
                ))
            }
        };

        let auth = if has_text(&self.role_arn) {
            TopicAuth::Role(self.role_arn.unwrap_or_default())
        } else if !has_text(&self.access_key) && !has_text(&self.secret_key) {
            return Err(DispatchError::validation(format!(
                "Role arn is missing/invalid: {}",
                or_null(&self.role_arn)
            )));
        } else if !has_text(&self.access_key) {
            return Err(DispatchError::validation("IAM user access key is missing"));
        } else if !has_text(&self.secret_key) {
            return Err(DispatchError::validation("IAM user secret key is missing"));
        } else {
            TopicAuth::IamKeys {
                access_key: self.access_key.unwrap_or_default(),
                secret_key: self.secret_key.unwrap_or_default(),
            }
        };

        if !is_valid_sns_arn(&topic_arn) {
            return Err(DispatchError::validation(format!(
                "Topic arn is missing/invalid: {topic_arn}"
            )));
        }
        if let TopicAuth::Role(role_arn) = &auth {
            if !is_valid_iam_arn(role_arn) {
                return Err(DispatchError::validation(format!(
                    "Role arn is missing/invalid: {role_arn}"
                )));
            }
        }

        let region = region_from_topic_arn(&topic_arn)
            .unwrap_or_default()
            .to_string();

        Ok(SnsMessage {
            destination_name: self.destination_name,
            content,
            topic_arn,
            region,
            auth,
            subject: self.subject,
        })
    }
}
