mod helpers;

use alertdispatch::credentials::{CredentialChain, StaticKeySource};
use alertdispatch::destinations::{DestinationFactory, SnsDestinationFactory};
use alertdispatch::message::{Message, SnsMessage};
use alertdispatch::test_utils::{FakeCredentialSource, RecordingTopicClientFactory};
use helpers::{ROLE_ARN, TOPIC_EAST, TOPIC_WEST};
use std::sync::Arc;

fn role_message(topic: &str, role: &str) -> Message {
    SnsMessage::builder("ops")
        .with_content("disk full")
        .with_topic_arn(topic)
        .with_role(role)
        .build()
        .unwrap()
        .into()
}

fn key_message(topic: &str, access_key: &str) -> Message {
    SnsMessage::builder("ops")
        .with_content("disk full")
        .with_topic_arn(topic)
        .with_iam_keys(access_key, "secret")
        .build()
        .unwrap()
        .into()
}

fn factory(clients: Arc<RecordingTopicClientFactory>) -> SnsDestinationFactory {
    let chain = CredentialChain::new(vec![
        Arc::new(FakeCredentialSource::with_keys("assume-role", "ASIA", "secret")),
        Arc::new(StaticKeySource),
    ]);
    SnsDestinationFactory::new(chain, clients)
}

#[tokio::test]
async fn test_same_identity_and_region_reuses_client() {
    // Arrange
    let clients = Arc::new(RecordingTopicClientFactory::new());
    let factory = factory(clients.clone());

    // Act
    for _ in 0..3 {
        factory.publish(&role_message(TOPIC_WEST, ROLE_ARN)).await.unwrap();
    }

    // Assert
    assert_eq!(clients.build_count(), 1);
    assert_eq!(clients.published().len(), 3);
}

#[tokio::test]
async fn test_each_region_and_identity_gets_its_own_client() {
    let clients = Arc::new(RecordingTopicClientFactory::new());
    let factory = factory(clients.clone());

    factory.publish(&role_message(TOPIC_WEST, ROLE_ARN)).await.unwrap();
    factory.publish(&role_message(TOPIC_EAST, ROLE_ARN)).await.unwrap();
    factory
        .publish(&role_message(TOPIC_WEST, "arn:aws:iam::012345678912:role/other"))
        .await
        .unwrap();
    factory.publish(&key_message(TOPIC_WEST, "AKIAONE")).await.unwrap();
    factory.publish(&key_message(TOPIC_WEST, "AKIAONE")).await.unwrap();

    assert_eq!(clients.build_count(), 4);
    let mut regions = clients.built_regions();
    regions.sort();
    assert_eq!(regions, vec!["us-east-1", "us-west-2", "us-west-2", "us-west-2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_build_one_client() {
    // Arrange
    let clients = Arc::new(RecordingTopicClientFactory::new());
    let factory = Arc::new(factory(clients.clone()));

    // Act
    let publishes: Vec<_> = (0..16)
        .map(|_| {
            let factory = factory.clone();
            tokio::spawn(async move { factory.publish(&role_message(TOPIC_WEST, ROLE_ARN)).await })
        })
        .collect();
    for result in futures::future::join_all(publishes).await {
        assert_eq!(result.unwrap().unwrap().content(), "message-1");
    }

    // Assert
    assert_eq!(clients.build_count(), 1);
    assert_eq!(factory.cached_clients().await, 1);
}
