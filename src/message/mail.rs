use super::{has_text, require_content, require_name, require_type};
use crate::core::DestinationType;
use crate::error::{DispatchError, Result};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SMTP_PORT: u16 = 25;

/// How the SMTP session is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailMethod {
    /// Plain SMTP with no transport security.
    #[default]
    None,
    /// Implicit TLS from the first byte.
    Ssl,
    /// Plain connection upgraded with STARTTLS.
    StartTls,
}

impl MailMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailMethod::None => "none",
            MailMethod::Ssl => "ssl",
            MailMethod::StartTls => "starttls",
        }
    }
}

impl fmt::Display for MailMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MailMethod {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "plain" => Ok(MailMethod::None),
            "ssl" => Ok(MailMethod::Ssl),
            "starttls" => Ok(MailMethod::StartTls),
            _ => Err(DispatchError::validation(
                "Invalid mail method supplied. Only none, ssl and starttls are allowed",
            )),
        }
    }
}

/// A message delivered over SMTP.
#[derive(Clone, PartialEq, Eq)]
pub struct MailMessage {
    destination_name: String,
    content: String,
    host: String,
    port: u16,
    auth_enabled: bool,
    method: MailMethod,
    from: String,
    recipients: Vec<String>,
    subject: String,
    credentials: Option<(String, String)>,
}

impl MailMessage {
    pub fn builder(destination_name: impl Into<String>) -> MailMessageBuilder {
        MailMessageBuilder {
            destination_type: DestinationType::Mail,
            destination_name: destination_name.into(),
            content: None,
            host: None,
            port: None,
            auth_enabled: false,
            method: None,
            from: None,
            recipients: Vec::new(),
            subject: None,
            username: None,
            password: None,
        }
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth_enabled
    }

    pub fn method(&self) -> MailMethod {
        self.method
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Username and password, present only when both were supplied.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }
}

impl fmt::Debug for MailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailMessage")
            .field("destination_name", &self.destination_name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("method", &self.method)
            .field("from", &self.from)
            .field("recipients", &self.recipients)
            .field("subject", &self.subject)
            .field("username", &self.credentials.as_ref().map(|(u, _)| u))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct MailMessageBuilder {
    destination_type: DestinationType,
    destination_name: String,
    content: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    auth_enabled: bool,
    method: Option<String>,
    from: Option<String>,
    recipients: Vec<String>,
    subject: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl MailMessageBuilder {
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_auth(mut self, auth_enabled: bool) -> Self {
        self.auth_enabled = auth_enabled;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients = recipients.into_iter().map(Into::into).collect();
        self
    }

    /// Accepts a comma separated recipient list.
    pub fn with_recipient_list(self, recipients: &str) -> Self {
        self.with_recipients(recipients.split(','))
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_type(mut self, destination_type: DestinationType) -> Self {
        self.destination_type = destination_type;
        self
    }

    pub fn build(self) -> Result<MailMessage> {
        require_name(&self.destination_name)?;
        require_type(self.destination_type, DestinationType::Mail)?;
        let content = require_content(self.content.as_deref())?.to_string();

        if !has_text(&self.host) {
            return Err(DispatchError::validation("Host name should be provided"));
        }
        if !has_text(&self.from) {
            return Err(DispatchError::validation("From address should be provided"));
        }
        let recipients: Vec<String> = self
            .recipients
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if recipients.is_empty() {
            return Err(DispatchError::validation(
                "List of recipients should be provided",
            ));
        }

        let method = self
            .method
            .as_deref()
            .map(MailMethod::from_str)
            .transpose()?
            .unwrap_or_default();

        let credentials = if has_text(&self.username) && has_text(&self.password) {
            Some((
                self.username.unwrap_or_default(),
                self.password.unwrap_or_default(),
            ))
        } else {
            None
        };
        if self.auth_enabled && credentials.is_none() {
            return Err(DispatchError::validation(
                "Username and password are required when authentication is enabled",
            ));
        }

        let subject = match self.subject {
            Some(subject) if !subject.is_empty() => subject,
            _ => self.destination_name.clone(),
        };

        Ok(MailMessage {
            destination_name: self.destination_name,
            content,
            host: self.host.unwrap_or_default(),
            port: self.port.unwrap_or(DEFAULT_SMTP_PORT),
            auth_enabled: self.auth_enabled,
            method,
            from: self.from.unwrap_or_default(),
            recipients,
            subject,
            credentials,
        })
    }
}
