use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use blockbus_error::EntryKind;

/// Метаданные блока.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
}

/// Метаданные записи ресурса (provider/consumer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub name: String,
}

/// Пара topic/subscription, на которую указывает запись ресурса.
///
/// `subscription` нужен только для роли подписчика, поэтому при отсутствии в
/// конфигурации остаётся пустой строкой.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSubscriptionSpec {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subscription: String,
}

/// Как запись используется: для публикации (нужен только topic) или для
/// подписки (нужны topic и subscription).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    Publishing,
    Subscribing,
}

/// Именованная запись provider/consumer внутри блока.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub spec: TopicSubscriptionSpec,
}

/// Списки providers/consumers.
///
/// Отсутствующий (или `null`) список отличается от пустого: резолвер
/// потребителей трактует эти случаи по-разному.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<ResourceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumers: Option<Vec<ResourceEntry>>,
}

/// Декларативное определение блока.
///
/// JSON-форма:
/// `{kind, metadata: {name}, spec: {providers: [...], consumers: [...]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: BlockSpec,
}

impl TopicSubscriptionSpec {
    pub fn new(
        topic: impl Into<String>,
        subscription: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            subscription: subscription.into(),
        }
    }

    /// Проверяет инварианты записи для указанной роли.
    pub fn validate(
        &self,
        role: EntryRole,
    ) -> Result<(), &'static str> {
        if self.topic.trim().is_empty() {
            return Err("topic must not be empty");
        }
        if role == EntryRole::Subscribing && self.subscription.trim().is_empty() {
            return Err("subscription must not be empty");
        }
        Ok(())
    }
}

impl ResourceEntry {
    pub fn new(
        name: impl Into<String>,
        spec: TopicSubscriptionSpec,
    ) -> Self {
        Self {
            metadata: ResourceMetadata { name: name.into() },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

impl BlockDefinition {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            metadata: Metadata { name: name.into() },
            spec: BlockSpec::default(),
        }
    }

    /// Добавляет provider-запись (создаёт список при необходимости).
    pub fn with_provider(
        mut self,
        entry: ResourceEntry,
    ) -> Self {
        self.spec.providers.get_or_insert_with(Vec::new).push(entry);
        self
    }

    /// Добавляет consumer-запись (создаёт список при необходимости).
    pub fn with_consumer(
        mut self,
        entry: ResourceEntry,
    ) -> Self {
        self.spec.consumers.get_or_insert_with(Vec::new).push(entry);
        self
    }

    /// Структурно декодирует слабо типизированный узел конфигурации в
    /// определение блока.
    pub fn from_node(node: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(node)
    }

    /// Обратное преобразование в узел конфигурации.
    pub fn to_node(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Первая provider-запись с указанным именем.
    pub fn find_provider(
        &self,
        name: &str,
    ) -> Option<&ResourceEntry> {
        find_entry(self.spec.providers.as_deref(), name)
    }

    /// Первая consumer-запись с указанным именем.
    pub fn find_consumer(
        &self,
        name: &str,
    ) -> Option<&ResourceEntry> {
        find_entry(self.spec.consumers.as_deref(), name)
    }

    /// Имена, которые встречаются в одном списке более одного раза.
    ///
    /// Поиск всегда берёт первую запись, поэтому дубликаты не ошибка, но
    /// почти наверняка опечатка в конфигурации.
    pub fn duplicate_names(&self) -> Vec<(EntryKind, String)> {
        let mut duplicates = Vec::new();
        for (kind, entries) in [
            (EntryKind::Provider, self.spec.providers.as_deref()),
            (EntryKind::Consumer, self.spec.consumers.as_deref()),
        ] {
            let mut seen = HashSet::new();
            for entry in entries.unwrap_or_default() {
                if !seen.insert(entry.name()) {
                    duplicates.push((kind, entry.name().to_string()));
                }
            }
        }
        duplicates
    }
}

fn find_entry<'a>(
    entries: Option<&'a [ResourceEntry]>,
    name: &str,
) -> Option<&'a ResourceEntry> {
    entries?.iter().find(|entry| entry.metadata.name == name)
}
