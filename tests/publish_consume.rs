mod common;

use std::{sync::Arc, time::Duration};

use blockbus::{
    Consumer, ConsumerState, Encoding, ErrorExt, HandlerError, Headers, InMemoryBroker, Payload,
    PubSubError, Publisher, StatusCode,
};
use common::{default_wiring, fast_settings, wiring, Order, RESOURCE, SUBSCRIPTION, TOPIC};
use rstest::rstest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Тест проверяет полный путь сообщения: данные и заголовки доходят до
/// обработчика в том виде, в каком были опубликованы.
#[rstest]
#[case::json(Encoding::Json)]
#[case::message_pack(Encoding::MessagePack)]
#[tokio::test]
async fn test_publish_then_consume(#[case] encoding: Encoding) {
    let broker = InMemoryBroker::new();
    let config = default_wiring();
    let settings = fast_settings(encoding);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let handler = move |order: Order, headers: Headers| {
        let seen_tx = seen_tx.clone();
        async move {
            seen_tx.send((order, headers)).ok();
            Ok::<(), HandlerError>(())
        }
    };

    let consumer = Arc::new(
        Consumer::<Order>::create_with(&config, &broker.connector(), RESOURCE, handler, &settings)
            .await
            .unwrap(),
    );
    assert_eq!(consumer.topic(), TOPIC);
    assert_eq!(consumer.subscription(), SUBSCRIPTION);
    assert_eq!(consumer.state(), ConsumerState::Idle);

    let cancel = CancellationToken::new();
    let running = {
        let consumer = consumer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { consumer.receive_messages(cancel).await })
    };

    let publisher = Publisher::<Order>::create_with(&config, &broker.connector(), RESOURCE, &settings)
        .await
        .unwrap();
    assert_eq!(publisher.topic(), TOPIC);
    assert_eq!(publisher.encoding(), encoding);

    let id = publisher
        .publish(
            Payload::new(Order::new(42, "teapot"))
                .header("trace-id", "abc-123")
                .header("origin", "checkout"),
        )
        .await
        .unwrap();
    assert!(!id.is_empty());

    let (order, headers) = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order, Order::new(42, "teapot"));
    assert_eq!(headers.len(), 2);
    assert_eq!(headers["trace-id"], "abc-123");
    assert_eq!(headers["origin"], "checkout");

    cancel.cancel();
    running.await.unwrap().unwrap();
    publisher.close().await.unwrap();
    consumer.close().await.unwrap();
    assert_eq!(broker.open_clients(), 0);
}

/// Тест проверяет, что повторное создание издателей и получателя для одного
/// ресурса не плодит topic и subscription.
#[tokio::test]
async fn test_provisioning_is_idempotent() {
    let broker = InMemoryBroker::new();
    let config = default_wiring();

    let first = Publisher::<Order>::create(&config, &broker.connector(), RESOURCE)
        .await
        .unwrap();
    let second = Publisher::<Order>::create(&config, &broker.connector(), RESOURCE)
        .await
        .unwrap();
    let consumer = Consumer::<Order>::create(
        &config,
        &broker.connector(),
        RESOURCE,
        |_order: Order, _headers: Headers| async { Ok::<(), HandlerError>(()) },
    )
    .await
    .unwrap();
    let again = Consumer::<Order>::create(
        &config,
        &broker.connector(),
        RESOURCE,
        |_order: Order, _headers: Headers| async { Ok::<(), HandlerError>(()) },
    )
    .await
    .unwrap();

    assert_eq!(broker.topics(), vec![TOPIC.to_string()]);
    assert_eq!(broker.subscriptions(), vec![SUBSCRIPTION.to_string()]);
    assert_eq!(broker.open_clients(), 4);

    for publisher in [first, second] {
        publisher.close().await.unwrap();
    }
    consumer.close().await.unwrap();
    again.close().await.unwrap();
    assert_eq!(broker.open_clients(), 0);
}

/// Тест проверяет, что публикация в закрытый издатель отклоняется ошибкой
/// `Closed`, а сообщение не попадает в брокер.
#[tokio::test]
async fn test_publish_after_close() {
    let broker = InMemoryBroker::new();
    let publisher = Publisher::<Order>::create(&default_wiring(), &broker.connector(), RESOURCE)
        .await
        .unwrap();

    publisher.close().await.unwrap();
    assert!(publisher.is_closed());

    let err = publisher
        .publish(Payload::new(Order::new(1, "apple")))
        .await
        .unwrap_err();
    assert!(matches!(err, PubSubError::Closed(_)));
    assert_eq!(err.status_code(), StatusCode::Closed);
    assert_eq!(broker.published(), 0);

    let err = publisher.close().await.unwrap_err();
    assert!(err.is_closed());
}

/// Тест проверяет, что все подписки одного topic получают копию сообщения.
#[tokio::test]
async fn test_fan_out_to_every_subscription() {
    let broker = InMemoryBroker::new();
    let primary = default_wiring();
    let audit = wiring(TOPIC, "orders-audit");

    let mut consumers = Vec::new();
    for config in [&primary, &audit] {
        consumers.push(
            Consumer::<Order>::create(
                config,
                &broker.connector(),
                RESOURCE,
                |_order: Order, _headers: Headers| async { Ok::<(), HandlerError>(()) },
            )
            .await
            .unwrap(),
        );
    }

    let publisher = Publisher::<Order>::create(&primary, &broker.connector(), RESOURCE)
        .await
        .unwrap();
    publisher
        .publish(Payload::new(Order::new(5, "kiwi")))
        .await
        .unwrap();

    for subscription in [SUBSCRIPTION, "orders-audit"] {
        let stats = broker.stats(subscription).unwrap();
        assert_eq!(stats.topic, TOPIC);
        assert_eq!(stats.pending, 1);
    }
    assert_eq!(broker.published(), 1);
}

/// Тест проверяет, что недоступный при создании брокер возвращает
/// транспортную ошибку и не оставляет открытых клиентов.
#[tokio::test]
async fn test_create_with_unavailable_broker() {
    let broker = InMemoryBroker::new();
    broker.set_available(false);

    let err = Consumer::<Order>::create(
        &default_wiring(),
        &broker.connector(),
        RESOURCE,
        |_order: Order, _headers: Headers| async { Ok::<(), HandlerError>(()) },
    )
    .await
    .err()
    .unwrap();
    assert!(matches!(err, PubSubError::Broker(_)));
    assert_eq!(broker.open_clients(), 0);
}
