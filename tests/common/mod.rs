#![allow(dead_code)]

use std::time::Duration;

use blockbus::{
    BlockInstance, BlockInstanceDetails, Connection, ConsumerSettings, Encoding, ResourceRef,
    RetryPolicy, Settings, StaticConfigProvider,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const RESOURCE: &str = "orders";
pub const TOPIC: &str = "orders-topic";
pub const SUBSCRIPTION: &str = "orders-sub";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub item: String,
}

impl Order {
    pub fn new(
        id: u64,
        item: &str,
    ) -> Self {
        Self {
            id,
            item: item.to_string(),
        }
    }
}

/// Конфигурация, в которой ресурс `orders` доступен обеим сторонам:
/// издатель находит consumer-запись связанного блока, получатель находит
/// provider-запись собственного блока.
pub fn wiring(
    topic: &str,
    subscription: &str,
) -> StaticConfigProvider {
    StaticConfigProvider::new()
        .with_provider_instance(
            RESOURCE,
            BlockInstanceDetails {
                instance_id: "billing-1".into(),
                block: json!({
                    "kind": "core/block-type-service",
                    "metadata": { "name": "billing" },
                    "spec": { "consumers": [
                        { "metadata": { "name": "order-events" },
                          "spec": { "topic": topic } }
                    ] }
                }),
                connections: vec![Connection {
                    provider: ResourceRef {
                        block_id: "shop".into(),
                        resource_name: RESOURCE.into(),
                    },
                    consumer: ResourceRef {
                        block_id: "billing".into(),
                        resource_name: "order-events".into(),
                    },
                }],
            },
        )
        .with_consumer_instance(
            RESOURCE,
            BlockInstance {
                instance_id: "shop-1".into(),
                block: json!({
                    "kind": "core/block-type-service",
                    "metadata": { "name": "shop" },
                    "spec": { "providers": [
                        { "metadata": { "name": RESOURCE },
                          "spec": { "topic": topic, "subscription": subscription } }
                    ] }
                }),
            },
        )
}

pub fn default_wiring() -> StaticConfigProvider {
    wiring(TOPIC, SUBSCRIPTION)
}

/// Короткие интервалы, чтобы тесты повторов укладывались в миллисекунды.
pub fn fast_settings(encoding: Encoding) -> Settings {
    Settings {
        consumer: ConsumerSettings {
            max_outstanding_messages: 8,
            drain_timeout_ms: 500,
            retry: RetryPolicy {
                max_attempts: Some(3),
                initial_interval_ms: 5,
                max_interval_ms: 20,
                randomization_factor: 0.0,
                ..Default::default()
            },
        },
        encoding,
    }
}

/// Ждёт выполнения условия не дольше пяти секунд.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not met in time");
}
