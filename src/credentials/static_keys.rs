use crate::core::CredentialSource;
use crate::message::TopicAuth;
use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;

/// Serves key-based auth with the caller's IAM user keys. They never expire.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticKeySource;

#[async_trait]
impl CredentialSource for StaticKeySource {
    fn name(&self) -> &'static str {
        "static-iam-keys"
    }

    async fn provider(&self, auth: &TopicAuth) -> Option<SharedCredentialsProvider> {
        match auth {
            TopicAuth::IamKeys {
                access_key,
                secret_key,
            } => Some(SharedCredentialsProvider::new(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static-iam-keys",
            ))),
            TopicAuth::Role(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::provider::ProvideCredentials;

    #[tokio::test]
    async fn test_wraps_key_pair() {
        let auth = TopicAuth::IamKeys {
            access_key: "AKIAEXAMPLE".into(),
            secret_key: "secret".into(),
        };

        let provider = StaticKeySource.provider(&auth).await.unwrap();
        let creds = provider.provide_credentials().await.unwrap();

        assert_eq!(creds.access_key_id(), "AKIAEXAMPLE");
        assert_eq!(creds.secret_access_key(), "secret");
        assert!(creds.expiry().is_none());
    }

    #[tokio::test]
    async fn test_declines_roles() {
        let auth = TopicAuth::Role("arn:aws:iam::012345678912:role/x".into());
        assert!(StaticKeySource.provider(&auth).await.is_none());
    }
}
