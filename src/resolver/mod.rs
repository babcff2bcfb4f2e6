//! Разрешение логического имени ресурса в пару topic/subscription.
//!
//! Сторона публикации идёт по соединениям провайдера к блоку-потребителю и
//! ищет там consumer-запись. Сторона подписки берёт блок потребителя и ищет в
//! нём provider-запись. Результат поиска помечается [`Resolution`], потому
//! что «не найдено» на двух сторонах означает разное.

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::ConfigProvider,
    error::{EntryKind, ResolutionError},
    model::{BlockDefinition, ResourceEntry, TopicSubscriptionSpec},
};

/// Исход поиска записи.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Запись найдена
    Found(T),
    /// Список записей есть, но нужной в нём нет: пустой результат, не ошибка
    NotFoundAsEmpty,
    /// Списка нет вовсе (или поиск на этой стороне не допускает пустого
    /// результата): ошибка
    NotFoundAsError,
}

impl<T> Resolution<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn map<U>(
        self,
        f: impl FnOnce(T) -> U,
    ) -> Resolution<U> {
        match self {
            Self::Found(value) => Resolution::Found(f(value)),
            Self::NotFoundAsEmpty => Resolution::NotFoundAsEmpty,
            Self::NotFoundAsError => Resolution::NotFoundAsError,
        }
    }

    /// `NotFoundAsEmpty` → `Ok(None)`, `NotFoundAsError` → `EntryNotFound`.
    pub fn into_result(
        self,
        resource: &str,
        kind: EntryKind,
    ) -> Result<Option<T>, ResolutionError> {
        match self {
            Self::Found(value) => Ok(Some(value)),
            Self::NotFoundAsEmpty => Ok(None),
            Self::NotFoundAsError => Err(not_found(resource, kind)),
        }
    }

    /// Оба варианта «не найдено» становятся ошибкой.
    pub fn require(
        self,
        resource: &str,
        kind: EntryKind,
    ) -> Result<T, ResolutionError> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFoundAsEmpty | Self::NotFoundAsError => Err(not_found(resource, kind)),
        }
    }
}

fn not_found(
    resource: &str,
    kind: EntryKind,
) -> ResolutionError {
    ResolutionError::EntryNotFound {
        resource: resource.to_string(),
        kind,
    }
}

/// Структурно декодирует узел конфигурации в определение блока.
pub fn decode_block(
    resource_name: &str,
    node: &Value,
) -> Result<BlockDefinition, ResolutionError> {
    let block = BlockDefinition::from_node(node).map_err(|e| ResolutionError::Decode {
        resource: resource_name.to_string(),
        reason: e.to_string(),
    })?;

    for (kind, name) in block.duplicate_names() {
        warn!(
            block = %block.name(),
            entry = %name,
            %kind,
            "Duplicate entry name in block definition, the first one wins"
        );
    }

    Ok(block)
}

/// Находит consumer-запись, связанную с ресурсом-провайдером.
///
/// Берётся первый экземпляр и его первое соединение; имя ресурса-потребителя
/// ищется в consumers блока этого экземпляра.
pub async fn find_consumer_entry<P>(
    config: &P,
    resource_name: &str,
) -> Result<Resolution<ResourceEntry>, ResolutionError>
where
    P: ConfigProvider + ?Sized,
{
    let instances = config
        .get_instances_for_provider(resource_name)
        .await
        .map_err(|e| ResolutionError::provider(resource_name, e))?;

    let Some(instance) = instances.first() else {
        return Err(ResolutionError::NoConnection {
            resource: resource_name.to_string(),
        });
    };
    let Some(connection) = instance.connections.first() else {
        return Err(ResolutionError::NoConnection {
            resource: resource_name.to_string(),
        });
    };

    let consumer_name = connection.consumer.resource_name.as_str();
    let block = decode_block(resource_name, &instance.block)?;

    let Some(consumers) = block.spec.consumers.as_deref() else {
        debug!(resource = %resource_name, block = %block.name(), "Block has no consumers list");
        return Ok(Resolution::NotFoundAsError);
    };

    match consumers.iter().find(|entry| entry.name() == consumer_name) {
        Some(entry) => {
            debug!(
                resource = %resource_name,
                consumer = %consumer_name,
                topic = %entry.spec.topic,
                "Resolved consumer entry"
            );
            Ok(Resolution::Found(entry.clone()))
        }
        None => {
            debug!(resource = %resource_name, consumer = %consumer_name, "No matching consumer entry");
            Ok(Resolution::NotFoundAsEmpty)
        }
    }
}

/// Topic consumer-записи, связанной с ресурсом-провайдером.
pub async fn resolve_consumer_topic<P>(
    config: &P,
    resource_name: &str,
) -> Result<Resolution<String>, ResolutionError>
where
    P: ConfigProvider + ?Sized,
{
    Ok(find_consumer_entry(config, resource_name)
        .await?
        .map(|entry| entry.spec.topic))
}

/// Пара topic/subscription provider-записи с указанным именем.
///
/// Отсутствие записи здесь всегда `NotFoundAsError`.
pub fn resolve_provider_topic_subscription(
    block: &BlockDefinition,
    resource_name: &str,
) -> Resolution<TopicSubscriptionSpec> {
    match block.find_provider(resource_name) {
        Some(entry) => {
            debug!(
                resource = %resource_name,
                topic = %entry.spec.topic,
                subscription = %entry.spec.subscription,
                "Resolved provider entry"
            );
            Resolution::Found(entry.spec.clone())
        }
        None => Resolution::NotFoundAsError,
    }
}
