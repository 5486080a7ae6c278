//! The JSON document form of a message, as read by the command line tool.

use super::{ChatMessage, CustomWebhookMessage, MailMessage, Message, SnsMessage};
use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Recipients given either as a list or as one comma separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    List(Vec<String>),
    Joined(String),
}

/// An unvalidated destination document. Converting it runs the builders.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationRequest {
    Sns {
        name: String,
        message: String,
        topic_arn: Option<String>,
        role_arn: Option<String>,
        iam_access_key: Option<String>,
        iam_secret_key: Option<String>,
        subject: Option<String>,
    },
    Chime {
        name: String,
        message: String,
        url: Option<String>,
    },
    Slack {
        name: String,
        message: String,
        url: Option<String>,
    },
    CustomWebhook {
        name: String,
        message: String,
        url: Option<String>,
        scheme: Option<String>,
        host: Option<String>,
        port: Option<u16>,
        path: Option<String>,
        method: Option<String>,
        #[serde(default)]
        query_params: BTreeMap<String, String>,
        #[serde(default)]
        header_params: BTreeMap<String, String>,
        username: Option<String>,
        password: Option<String>,
    },
    Mail {
        name: String,
        message: String,
        host: Option<String>,
        port: Option<u16>,
        #[serde(default)]
        auth: bool,
        method: Option<String>,
        from: Option<String>,
        recipients: Option<Recipients>,
        subject: Option<String>,
        username: Option<String>,
        password: Option<String>,
    },
}

impl DestinationRequest {
    pub fn into_message(self) -> Result<Message> {
        let message = match self {
            DestinationRequest::Sns {
                name,
                message,
                topic_arn,
                role_arn,
                iam_access_key,
                iam_secret_key,
                subject,
            } => {
                let mut builder = SnsMessage::builder(name).with_content(message);
                if let Some(topic_arn) = topic_arn {
                    builder = builder.with_topic_arn(topic_arn);
                }
                if let Some(role_arn) = role_arn {
                    builder = builder.with_role(role_arn);
                }
                if let Some(key) = iam_access_key {
                    builder = builder.with_access_key(key);
                }
                if let Some(key) = iam_secret_key {
                    builder = builder.with_secret_key(key);
                }
                if let Some(subject) = subject {
                    builder = builder.with_subject(subject);
                }
                builder.build()?.into()
            }
            DestinationRequest::Chime { name, message, url } => {
                let mut builder = ChatMessage::chime(name).with_content(message);
                if let Some(url) = url {
                    builder = builder.with_url(url);
                }
                Message::Chime(builder.build()?)
            }
            DestinationRequest::Slack { name, message, url } => {
                let mut builder = ChatMessage::slack(name).with_content(message);
                if let Some(url) = url {
                    builder = builder.with_url(url);
                }
                Message::Slack(builder.build()?)
            }
            DestinationRequest::CustomWebhook {
                name,
                message,
                url,
                scheme,
                host,
                port,
                path,
                method,
                query_params,
                header_params,
                username,
                password,
            } => {
                let mut builder = CustomWebhookMessage::builder(name)
                    .with_content(message)
                    .with_query_params(query_params)
                    .with_header_params(header_params);
                if let Some(url) = url {
                    builder = builder.with_url(url);
                }
                if let Some(scheme) = scheme {
                    builder = builder.with_scheme(scheme);
                }
                if let Some(host) = host {
                    builder = builder.with_host(host);
                }
                if let Some(port) = port {
                    builder = builder.with_port(port);
                }
                if let Some(path) = path {
                    builder = builder.with_path(path);
                }
                if let Some(method) = method {
                    builder = builder.with_method(method);
                }
                if let Some(username) = username {
                    builder = builder.with_basic_auth(username, password.unwrap_or_default());
                }
                builder.build()?.into()
            }
            DestinationRequest::Mail {
                name,
                message,
                host,
                port,
                auth,
                method,
                from,
                recipients,
                subject,
                username,
                password,
            } => {
                let mut builder = MailMessage::builder(name)
                    .with_content(message)
                    .with_auth(auth);
                if let Some(host) = host {
                    builder = builder.with_host(host);
                }
                if let Some(port) = port {
                    builder = builder.with_port(port);
                }
                if let Some(method) = method {
                    builder = builder.with_method(method);
                }
                if let Some(from) = from {
                    builder = builder.with_from(from);
                }
                builder = match recipients {
                    Some(Recipients::List(list)) => builder.with_recipients(list),
                    Some(Recipients::Joined(joined)) => builder.with_recipient_list(&joined),
                    None => builder,
                };
                if let Some(subject) = subject {
                    builder = builder.with_subject(subject);
                }
                if let (Some(username), Some(password)) = (username, password) {
                    builder = builder.with_credentials(username, password);
                }
                builder.build()?.into()
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DestinationType;
    use serde_json::json;

    #[test]
    fn test_webhook_document_converts() {
        let request: DestinationRequest = serde_json::from_value(json!({
            "type": "custom_webhook",
            "name": "hooks",
            "message": "{\"a\":1}",
            "host": "hooks.example.com",
            "path": "incoming/abc",
            "header_params": {"X-Token": "t"}
        }))
        .unwrap();

        let message = request.into_message().unwrap();
        let Message::CustomWebhook(webhook) = message else {
            panic!("expected a webhook message");
        };
        assert_eq!(webhook.url().as_str(), "https://hooks.example.com/incoming/abc");
        assert_eq!(webhook.header_params().get("X-Token").unwrap(), "t");
    }

    #[test]
    fn test_mail_document_accepts_joined_recipients() {
        let request: DestinationRequest = serde_json::from_value(json!({
            "type": "mail",
            "name": "oncall",
            "message": "body",
            "host": "smtp.example.com",
            "from": "alerts@example.com",
            "recipients": "a@example.com,b@example.com"
        }))
        .unwrap();

        let message = request.into_message().unwrap();
        assert_eq!(message.destination_type(), DestinationType::Mail);
        let Message::Mail(mail) = message else {
            panic!("expected a mail message");
        };
        assert_eq!(mail.recipients().len(), 2);
    }

    #[test]
    fn test_validation_errors_pass_through() {
        let request: DestinationRequest = serde_json::from_value(json!({
            "type": "sns",
            "name": "ops",
            "message": "hello",
            "topic_arn": "arn:aws:sns:us-east-1:012345678912:alerts"
        }))
        .unwrap();

        let err = request.into_message().unwrap_err();
        assert_eq!(err.to_string(), "Role arn is missing/invalid: null");
    }
}
