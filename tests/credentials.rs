mod helpers;

use alertdispatch::config::CredentialsConfig;
use alertdispatch::credentials::{CredentialCache, InternalAuthClient};
use alertdispatch::test_utils::CountingCredentialFetcher;
use helpers::init_tracing;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_sequential_reads_fetch_once() {
    // Arrange
    let fetcher = Arc::new(CountingCredentialFetcher::valid_for(Duration::from_secs(3600)));
    let cache = CredentialCache::new("internal-auth", fetcher.clone());

    // Act
    for _ in 0..5 {
        assert!(cache.get().await.is_some());
    }

    // Assert
    assert_eq!(fetcher.count(), 1);
}

#[tokio::test]
async fn test_record_inside_expiry_buffer_is_refetched() {
    // Records live 5s but the buffer is 10s, so every read sees an expired record.
    let fetcher = Arc::new(CountingCredentialFetcher::valid_for(Duration::from_secs(5)));
    let cache = CredentialCache::with_buffer("internal-auth", fetcher.clone(), Duration::from_secs(10));

    let first = cache.get().await.unwrap();
    let second = cache.get().await.unwrap();

    assert_eq!(fetcher.count(), 2);
    assert_ne!(first.session_token, second.session_token);
}

#[tokio::test]
async fn test_record_refetched_once_actually_expired() {
    let fetcher = Arc::new(CountingCredentialFetcher::valid_for(Duration::from_millis(1200)));
    let cache = CredentialCache::with_buffer("internal-auth", fetcher.clone(), Duration::from_millis(200));

    cache.get().await.unwrap();
    cache.get().await.unwrap();
    assert_eq!(fetcher.count(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    cache.get().await.unwrap();
    assert_eq!(fetcher.count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_one_refresh() {
    // Arrange
    init_tracing();
    let fetcher = Arc::new(
        CountingCredentialFetcher::valid_for(Duration::from_secs(3600))
            .with_delay(Duration::from_millis(100)),
    );
    let cache = Arc::new(CredentialCache::new("internal-auth", fetcher.clone()));

    // Act
    let readers: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get().await })
        })
        .collect();
    let records = futures::future::join_all(readers).await;

    // Assert
    assert_eq!(fetcher.count(), 1);
    for record in records {
        assert_eq!(record.unwrap().unwrap().access_key, "ASIATEST");
    }
}

#[tokio::test]
async fn test_internal_auth_backed_cache_calls_service_once() {
    // Arrange
    let server = MockServer::start().await;
    let expiry = chrono::Utc::now().timestamp_millis() + 3_600_000;
    Mock::given(method("GET"))
        .and(path("/_internal/auth"))
        .and(query_param("policy_id", "AR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_key": "ASIAINTERNAL",
            "secret_key": "secret",
            "session_token": "token",
            "expiry": expiry,
        })))
        .expect(1)
        .mount(&server)
        .await;
    let config = CredentialsConfig {
        internal_auth_host: server.address().ip().to_string(),
        internal_auth_port: server.address().port(),
        ..Default::default()
    };
    let client = InternalAuthClient::from_config(&config).unwrap();
    let cache = CredentialCache::new("internal-auth", Arc::new(client));

    // Act
    let first = cache.get().await.unwrap();
    let second = cache.get().await.unwrap();

    // Assert
    assert_eq!(first.access_key, "ASIAINTERNAL");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unavailable_service_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let config = CredentialsConfig {
        internal_auth_host: server.address().ip().to_string(),
        internal_auth_port: server.address().port(),
        ..Default::default()
    };
    let cache = CredentialCache::new(
        "internal-auth",
        Arc::new(InternalAuthClient::from_config(&config).unwrap()),
    );

    assert!(cache.get().await.is_none());
    assert!(cache.get().await.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
