use std::{
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::Encoding;
use crate::{
    broker::{ensure_topic, BrokerClient, BrokerConnector, OutboundMessage},
    config::{ConfigProvider, Settings},
    error::{ClosedError, EntryKind, PubSubError, PubSubResult, ResolutionError},
    model::{EntryRole, Payload, TopicSubscriptionSpec},
    resolver::resolve_consumer_topic,
};

const COMPONENT: &str = "publisher";

/// Типизированный издатель одного topic.
///
/// Topic определяется по consumer-записи блока, связанного с ресурсом.
/// Владеет собственным клиентом брокера до вызова [`Publisher::close`].
pub struct Publisher<T> {
    resource_name: String,
    topic: String,
    encoding: Encoding,
    client: Box<dyn BrokerClient>,
    closed: AtomicBool,
    _payload: PhantomData<fn(T)>,
}

impl<T> Publisher<T>
where
    T: Serialize,
{
    /// Создаёт издателя с настройками по умолчанию.
    pub async fn create<P, C>(
        config: &P,
        connector: &C,
        resource_name: &str,
    ) -> PubSubResult<Self>
    where
        P: ConfigProvider + ?Sized,
        C: BrokerConnector + ?Sized,
    {
        Self::create_with(config, connector, resource_name, &Settings::default()).await
    }

    /// Разрешает topic, подключается к брокеру и создаёт topic при
    /// необходимости. При любой ошибке полученный клиент закрывается.
    pub async fn create_with<P, C>(
        config: &P,
        connector: &C,
        resource_name: &str,
        settings: &Settings,
    ) -> PubSubResult<Self>
    where
        P: ConfigProvider + ?Sized,
        C: BrokerConnector + ?Sized,
    {
        let topic = resolve_consumer_topic(config, resource_name)
            .await?
            .require(resource_name, EntryKind::Consumer)?;
        TopicSubscriptionSpec::new(topic.as_str(), "")
            .validate(EntryRole::Publishing)
            .map_err(|reason| ResolutionError::InvalidEntry {
                resource: resource_name.to_string(),
                reason: reason.to_string(),
            })?;

        let client = connector.connect().await?;
        if let Err(err) = ensure_topic(client.as_ref(), &topic).await {
            if let Err(close_err) = client.close().await {
                warn!(%topic, error = %close_err, "Failed to release broker client");
            }
            return Err(err.into());
        }

        info!(resource = %resource_name, %topic, encoding = ?settings.encoding, "Publisher created");
        Ok(Self {
            resource_name: resource_name.to_string(),
            topic,
            encoding: settings.encoding,
            client,
            closed: AtomicBool::new(false),
            _payload: PhantomData,
        })
    }

    /// Кодирует и публикует сообщение, возвращает идентификатор брокера.
    ///
    /// Ошибка кодирования возвращается до обращения к брокеру. Повторов нет.
    pub async fn publish(
        &self,
        payload: Payload<T>,
    ) -> PubSubResult<String> {
        self.ensure_open()?;

        let message = {
            let (data, headers) = payload.into_parts();
            OutboundMessage::with_attributes(self.encoding.encode(&data)?, headers)
        };

        let id = self
            .client
            .publish(&self.topic, message)
            .await
            .map_err(|e| PubSubError::from(e).closed_as(COMPONENT, &self.topic))?;
        debug!(topic = %self.topic, %id, "Published message");
        Ok(id)
    }
}

impl<T> Publisher<T> {
    /// Освобождает клиент брокера. Повторный вызов возвращает `ClosedError`.
    pub async fn close(&self) -> PubSubResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ClosedError::new(COMPONENT, &self.topic).into());
        }
        self.client
            .close()
            .await
            .map_err(|e| PubSubError::from(e).closed_as(COMPONENT, &self.topic))?;
        info!(resource = %self.resource_name, topic = %self.topic, "Publisher closed");
        Ok(())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ClosedError> {
        if self.is_closed() {
            return Err(ClosedError::new(COMPONENT, &self.topic));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        broker::{InMemoryBroker, MessageStream},
        config::{BlockInstanceDetails, Connection, ResourceRef, StaticConfigProvider},
        model::Headers,
    };

    fn config(topic: &str) -> StaticConfigProvider {
        StaticConfigProvider::new().with_provider_instance(
            "orders",
            BlockInstanceDetails {
                instance_id: "shop".into(),
                block: json!({
                    "kind": "pubsub",
                    "metadata": { "name": "billing" },
                    "spec": { "consumers": [
                        { "metadata": { "name": "order-events" }, "spec": { "topic": topic } }
                    ] }
                }),
                connections: vec![Connection {
                    provider: ResourceRef {
                        block_id: "shop".into(),
                        resource_name: "orders".into(),
                    },
                    consumer: ResourceRef {
                        block_id: "billing".into(),
                        resource_name: "order-events".into(),
                    },
                }],
            },
        )
    }

    #[tokio::test]
    async fn test_create_provisions_topic() {
        let broker = InMemoryBroker::new();
        let publisher = Publisher::<u32>::create(&config("orders-topic"), &broker.connector(), "orders")
            .await
            .unwrap();
        assert_eq!(publisher.topic(), "orders-topic");
        assert_eq!(broker.topics(), vec!["orders-topic".to_string()]);

        // Второй издатель того же topic ничего не создаёт
        let second = Publisher::<u32>::create(&config("orders-topic"), &broker.connector(), "orders")
            .await
            .unwrap();
        assert_eq!(broker.topics().len(), 1);
        assert_eq!(broker.open_clients(), 2);

        publisher.close().await.unwrap();
        second.close().await.unwrap();
        assert_eq!(broker.open_clients(), 0);
    }

    #[tokio::test]
    async fn test_publish_sends_body_and_headers() {
        let broker = InMemoryBroker::new();
        let connector = broker.connector();
        let publisher = Publisher::<Vec<u32>>::create(&config("orders-topic"), &connector, "orders")
            .await
            .unwrap();

        let client = crate::broker::BrokerConnector::connect(&connector).await.unwrap();
        client.create_subscription("tap", "orders-topic").await.unwrap();
        let mut stream: Box<dyn MessageStream> = client.subscribe("tap").await.unwrap();

        let id = publisher
            .publish(Payload::new(vec![1, 2, 3]).header("trace-id", "abc"))
            .await
            .unwrap();

        let msg = stream.next_message().await.unwrap().unwrap();
        assert_eq!(msg.id, id);
        assert_eq!(&msg.data[..], b"[1,2,3]");
        let mut expected = Headers::new();
        expected.insert("trace-id".into(), "abc".into());
        assert_eq!(msg.attributes, expected);
        msg.ack();
    }

    #[tokio::test]
    async fn test_publish_after_close() {
        let broker = InMemoryBroker::new();
        let publisher = Publisher::<u32>::create(&config("orders-topic"), &broker.connector(), "orders")
            .await
            .unwrap();
        publisher.close().await.unwrap();
        assert!(publisher.is_closed());

        let err = publisher.publish(Payload::new(1)).await.unwrap_err();
        assert!(matches!(err, PubSubError::Closed(_)));
        assert_eq!(err.to_string(), "The publisher for orders-topic is closed");

        assert!(matches!(publisher.close().await, Err(PubSubError::Closed(_))));
        assert_eq!(broker.published(), 0);
    }

    #[tokio::test]
    async fn test_missing_consumer_entry_fails_creation() {
        let broker = InMemoryBroker::new();
        let config = StaticConfigProvider::new();
        let err = Publisher::<u32>::create(&config, &broker.connector(), "orders")
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PubSubError::Resolution(ResolutionError::NoConnection { .. })
        ));
        assert_eq!(broker.open_clients(), 0);
    }

    #[tokio::test]
    async fn test_empty_topic_is_invalid() {
        let broker = InMemoryBroker::new();
        let err = Publisher::<u32>::create(&config(""), &broker.connector(), "orders")
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PubSubError::Resolution(ResolutionError::InvalidEntry { .. })
        ));
    }

    /// Тест проверяет, что при сбое создания topic клиент освобождается.
    #[tokio::test]
    async fn test_provisioning_failure_releases_client() {
        let broker = InMemoryBroker::new();
        broker.deny_provisioning(true);
        let err = Publisher::<u32>::create(&config("orders-topic"), &broker.connector(), "orders")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PubSubError::Broker(_)));
        assert_eq!(broker.open_clients(), 0);
    }

    #[tokio::test]
    async fn test_broker_unavailable() {
        let broker = InMemoryBroker::new();
        let publisher = Publisher::<u32>::create(&config("orders-topic"), &broker.connector(), "orders")
            .await
            .unwrap();
        broker.set_available(false);
        let err = publisher.publish(Payload::new(1)).await.unwrap_err();
        assert!(matches!(err, PubSubError::Broker(_)));
    }
}
