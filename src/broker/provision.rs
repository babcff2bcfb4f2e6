use tracing::{debug, info};

use super::BrokerClient;
use crate::error::BrokerError;

/// Создаёт topic, если его ещё нет.
///
/// Если между проверкой и созданием topic успел создать кто-то другой,
/// `AlreadyExists` считается успехом после повторной проверки.
pub async fn ensure_topic(
    client: &dyn BrokerClient,
    topic: &str,
) -> Result<(), BrokerError> {
    if client.topic_exists(topic).await? {
        debug!(%topic, "Topic already exists");
        return Ok(());
    }

    match client.create_topic(topic).await {
        Ok(()) => {
            info!(%topic, "Created topic");
            Ok(())
        }
        Err(err) if err.is_already_exists() => {
            if client.topic_exists(topic).await? {
                debug!(%topic, "Topic was created concurrently");
                Ok(())
            } else {
                Err(err)
            }
        }
        Err(err) => Err(err),
    }
}

/// Создаёт subscription на `topic`, если её ещё нет.
pub async fn ensure_subscription(
    client: &dyn BrokerClient,
    subscription: &str,
    topic: &str,
) -> Result<(), BrokerError> {
    if client.subscription_exists(subscription).await? {
        debug!(%subscription, "Subscription already exists");
        return Ok(());
    }

    match client.create_subscription(subscription, topic).await {
        Ok(()) => {
            info!(%subscription, %topic, "Created subscription");
            Ok(())
        }
        Err(err) if err.is_already_exists() => {
            if client.subscription_exists(subscription).await? {
                debug!(%subscription, "Subscription was created concurrently");
                Ok(())
            } else {
                Err(err)
            }
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        broker::{
            memory::InMemoryBroker, BrokerConnector, MessageStream, OutboundMessage,
        },
        error::ResourceKind,
    };

    /// Клиент, у которого topic «появляется» между проверкой и созданием.
    #[derive(Default)]
    struct RacingClient {
        created_elsewhere: AtomicBool,
        create_calls: AtomicUsize,
        lie_about_existence: bool,
    }

    #[async_trait]
    impl BrokerClient for RacingClient {
        async fn topic_exists(
            &self,
            _topic: &str,
        ) -> Result<bool, BrokerError> {
            Ok(self.created_elsewhere.load(Ordering::SeqCst) && !self.lie_about_existence)
        }

        async fn create_topic(
            &self,
            topic: &str,
        ) -> Result<(), BrokerError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.created_elsewhere.store(true, Ordering::SeqCst);
            Err(BrokerError::AlreadyExists {
                kind: ResourceKind::Topic,
                name: topic.to_string(),
            })
        }

        async fn subscription_exists(
            &self,
            _subscription: &str,
        ) -> Result<bool, BrokerError> {
            Ok(false)
        }

        async fn create_subscription(
            &self,
            _subscription: &str,
            _topic: &str,
        ) -> Result<(), BrokerError> {
            Err(BrokerError::Transport {
                reason: "unavailable".into(),
            })
        }

        async fn publish(
            &self,
            _topic: &str,
            _message: OutboundMessage,
        ) -> Result<String, BrokerError> {
            Err(BrokerError::ClientClosed)
        }

        async fn subscribe(
            &self,
            _subscription: &str,
        ) -> Result<Box<dyn MessageStream>, BrokerError> {
            Err(BrokerError::ClientClosed)
        }

        async fn close(&self) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    /// Тест проверяет идемпотентность: повторный вызов ничего не создаёт.
    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let broker = InMemoryBroker::new();
        let client = broker.connector().connect().await.unwrap();

        ensure_topic(client.as_ref(), "orders").await.unwrap();
        ensure_topic(client.as_ref(), "orders").await.unwrap();
        ensure_subscription(client.as_ref(), "orders-sub", "orders")
            .await
            .unwrap();
        ensure_subscription(client.as_ref(), "orders-sub", "orders")
            .await
            .unwrap();

        assert_eq!(broker.topics(), vec!["orders".to_string()]);
        assert_eq!(broker.subscriptions(), vec!["orders-sub".to_string()]);
    }

    /// Тест проверяет, что гонка при создании считается успехом.
    #[tokio::test]
    async fn test_concurrent_creation_is_success() {
        let client = RacingClient::default();
        ensure_topic(&client, "orders").await.unwrap();
        assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
    }

    /// Тест проверяет, что `AlreadyExists` без подтверждения остаётся ошибкой.
    #[tokio::test]
    async fn test_unconfirmed_already_exists_is_error() {
        let client = RacingClient {
            lie_about_existence: true,
            ..Default::default()
        };
        let err = ensure_topic(&client, "orders").await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let client = RacingClient::default();
        let err = ensure_subscription(&client, "orders-sub", "orders")
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Transport { .. }));
    }
}
