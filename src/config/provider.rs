use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use blockbus_error::ProviderError;

/// Ссылка на именованный ресурс конкретного блока.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    #[serde(default)]
    pub block_id: String,
    pub resource_name: String,
}

/// Соединение между ресурсом-провайдером и ресурсом-потребителем.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub provider: ResourceRef,
    pub consumer: ResourceRef,
}

/// Экземпляр блока вместе с соединениями, ведущими к ресурсу.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInstanceDetails {
    #[serde(default)]
    pub instance_id: String,
    /// Слабо типизированное определение блока (см. `BlockDefinition::from_node`)
    pub block: Value,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// Экземпляр блока, потребляющего ресурс.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInstance {
    #[serde(default)]
    pub instance_id: String,
    pub block: Value,
}

/// Внешний провайдер конфигурации.
///
/// Ошибки реализации передаются вызывающему коду без изменений (внутри
/// `ResolutionError::Provider`). Данные читаются заново при каждом создании
/// Publisher/Consumer, ядро их не кэширует.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Экземпляры блоков и соединения для ресурса-провайдера.
    async fn get_instances_for_provider(
        &self,
        resource_name: &str,
    ) -> Result<Vec<BlockInstanceDetails>, ProviderError>;

    /// Экземпляр блока для ресурса-потребителя.
    async fn get_instance_for_consumer(
        &self,
        resource_name: &str,
    ) -> Result<BlockInstance, ProviderError>;
}

#[async_trait]
impl<P: ConfigProvider + ?Sized> ConfigProvider for Arc<P> {
    async fn get_instances_for_provider(
        &self,
        resource_name: &str,
    ) -> Result<Vec<BlockInstanceDetails>, ProviderError> {
        (**self).get_instances_for_provider(resource_name).await
    }

    async fn get_instance_for_consumer(
        &self,
        resource_name: &str,
    ) -> Result<BlockInstance, ProviderError> {
        (**self).get_instance_for_consumer(resource_name).await
    }
}
