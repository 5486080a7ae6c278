use super::{has_text, redact_url, require_content, require_name, require_type};
use crate::core::DestinationType;
use crate::error::{DispatchError, Result};
use reqwest::{Method, Url};
use std::collections::BTreeMap;
use std::fmt;

/// A message for a generic HTTP webhook.
///
/// The target URI is fixed at build time, either taken verbatim from a fully
/// qualified URL or composed from scheme, host, port, path and query params.
#[derive(Clone, PartialEq, Eq)]
pub struct CustomWebhookMessage {
    destination_name: String,
    content: String,
    url: Url,
    method: Method,
    header_params: BTreeMap<String, String>,
    basic_auth: Option<(String, String)>,
}

impl CustomWebhookMessage {
    pub fn builder(destination_name: impl Into<String>) -> CustomWebhookMessageBuilder {
        CustomWebhookMessageBuilder {
            destination_type: DestinationType::CustomWebhook,
            destination_name: destination_name.into(),
            content: None,
            url: None,
            scheme: None,
            host: None,
            port: None,
            path: None,
            method: None,
            query_params: BTreeMap::new(),
            header_params: BTreeMap::new(),
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

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn header_params(&self) -> &BTreeMap<String, String> {
        &self.header_params
    }

    /// Username and password, present only when a username was supplied.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        self.basic_auth
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }
}

impl fmt::Debug for CustomWebhookMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomWebhookMessage")
            .field("destination_name", &self.destination_name)
            .field("url", &redact_url(&self.url))
            .field("method", &self.method)
            .field("header_params", &self.header_params.keys().collect::<Vec<_>>())
            .field("basic_auth", &self.basic_auth.as_ref().map(|(u, _)| u))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct CustomWebhookMessageBuilder {
    destination_type: DestinationType,
    destination_name: String,
    content: Option<String>,
    url: Option<String>,
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    method: Option<String>,
    query_params: BTreeMap<String, String>,
    header_params: BTreeMap<String, String>,
    username: Option<String>,
    password: Option<String>,
}

impl CustomWebhookMessageBuilder {
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
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

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_query_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.query_params = params;
        self
    }

    pub fn with_header_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.header_params = params;
        self
    }

    pub fn with_basic_auth(
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

    pub fn build(self) -> Result<CustomWebhookMessage> {
        require_name(&self.destination_name)?;
        require_type(self.destination_type, DestinationType::CustomWebhook)?;
        let content = require_content(self.content.as_deref())?.to_string();

        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        if url.is_none() && !has_text(&self.host) {
            return Err(DispatchError::validation(
                "Either fully qualified URL or host name should be provided",
            ));
        }

        let method = match self.method.as_deref().map(str::trim) {
            None | Some("") => Method::POST,
            Some("POST") => Method::POST,
            Some("PUT") => Method::PUT,
            Some("PATCH") => Method::PATCH,
            Some(_) => {
                return Err(DispatchError::validation(
                    "Invalid method supplied. Only POST, PUT and PATCH are allowed",
                ))
            }
        };

        let url = match url {
            Some(url) => Url::parse(url).map_err(|_| uri_error())?,
            None => self.compose_url()?,
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(uri_error());
        }

        let basic_auth = match self.username {
            Some(username) if !username.is_empty() => {
                Some((username, self.password.unwrap_or_default()))
            }
            _ => None,
        };

        Ok(CustomWebhookMessage {
            destination_name: self.destination_name,
            content,
            url,
            method,
            header_params: self.header_params,
            basic_auth,
        })
    }

    fn compose_url(&self) -> Result<Url> {
        let scheme = self
            .scheme
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("https");
        let host = self.host.as_deref().unwrap_or_default().trim();

        let mut url = Url::parse(&format!("{scheme}://{host}")).map_err(|_| uri_error())?;
        if url.host_str().is_none() {
            return Err(uri_error());
        }
        if let Some(port) = self.port {
            url.set_port(Some(port)).map_err(|_| uri_error())?;
        }
        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            if path.starts_with('/') {
                url.set_path(path);
            } else {
                url.set_path(&format!("/{path}"));
            }
        }
        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query_params.iter());
        }
        Ok(url)
    }
}

fn uri_error() -> DispatchError {
    DispatchError::validation("Error creating URI")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CustomWebhookMessageBuilder {
        CustomWebhookMessage::builder("hooks").with_content("{\"alert\":1}")
    }

    #[test]
    fn test_composes_uri_from_parts() {
        let message = base()
            .with_host("hooks.example.com")
            .with_path("incoming/abc")
            .build()
            .unwrap();

        assert_eq!(message.url().as_str(), "https://hooks.example.com/incoming/abc");
        assert_eq!(message.method(), &Method::POST);
        assert!(message.basic_auth().is_none());
    }

    #[test]
    fn test_composes_port_scheme_and_query() {
        let mut query = BTreeMap::new();
        query.insert("token".to_string(), "a b".to_string());
        let message = base()
            .with_scheme("http")
            .with_host("hooks.example.com")
            .with_port(8080)
            .with_path("/in")
            .with_query_params(query)
            .build()
            .unwrap();

        assert_eq!(
            message.url().as_str(),
            "http://hooks.example.com:8080/in?token=a+b"
        );
    }

    #[test]
    fn test_url_takes_precedence_over_parts() {
        let message = base()
            .with_url("  https://a.example.com/x  ")
            .with_host("b.example.com")
            .with_method("PUT")
            .build()
            .unwrap();

        assert_eq!(message.url().as_str(), "https://a.example.com/x");
        assert_eq!(message.method(), &Method::PUT);
    }

    #[test]
    fn test_requires_url_or_host() {
        let err = base().build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Either fully qualified URL or host name should be provided"
        );
    }

    #[test]
    fn test_rejects_other_methods() {
        let err = base()
            .with_host("hooks.example.com")
            .with_method("GET")
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid method supplied. Only POST, PUT and PATCH are allowed"
        );
    }

    #[test]
    fn test_unparseable_parts_fail_uri_creation() {
        let err = base().with_host("bad host").build().unwrap_err();
        assert_eq!(err.to_string(), "Error creating URI");
    }

    #[test]
    fn test_only_http_schemes_are_accepted() {
        let err = base()
            .with_url("ftp://hooks.example.com/x")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Error creating URI");
        assert!(err.is_bad_request());

        let err = base()
            .with_scheme("gopher")
            .with_host("hooks.example.com")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Error creating URI");

        let err = base().with_url("mailto:ops@example.com").build().unwrap_err();
        assert_eq!(err.to_string(), "Error creating URI");
    }

    #[test]
    fn test_basic_auth_requires_username() {
        let with_user = base()
            .with_host("hooks.example.com")
            .with_basic_auth("svc", "pw")
            .build()
            .unwrap();
        assert_eq!(with_user.basic_auth(), Some(("svc", "pw")));

        let without_user = base()
            .with_host("hooks.example.com")
            .with_basic_auth("", "pw")
            .build()
            .unwrap();
        assert!(without_user.basic_auth().is_none());
    }

    #[test]
    fn test_type_tag_and_content_checks() {
        let err = base().with_type(DestinationType::Sns).build().unwrap_err();
        assert_eq!(err.to_string(), "Channel Type does not match CustomWebhook");

        let err = CustomWebhookMessage::builder("hooks")
            .with_host("hooks.example.com")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Message content is missing");
    }
}
