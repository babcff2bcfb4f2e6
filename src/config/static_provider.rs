use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BlockInstance, BlockInstanceDetails, ConfigProvider, ProviderError};
use crate::error::ConfigLoadError;

/// Документ, из которого собирается [`StaticConfigProvider`].
///
/// ```json
/// {
///   "providers": { "<resource>": [ { "instanceId": "...", "block": {...}, "connections": [...] } ] },
///   "consumers": { "<resource>": { "instanceId": "...", "block": {...} } }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub providers: HashMap<String, Vec<BlockInstanceDetails>>,
    #[serde(default)]
    pub consumers: HashMap<String, BlockInstance>,
}

/// Провайдер конфигурации с заранее известным набором экземпляров.
///
/// Используется в тестах, демо и однопроцессных развёртываниях, где
/// конфигурация блоков поставляется файлом.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: StaticConfig,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: StaticConfig) -> Self {
        Self { config }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigLoadError> {
        Ok(Self::from_config(serde_json::from_str(json)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Регистрирует экземпляр блока для ресурса-провайдера.
    pub fn with_provider_instance(
        mut self,
        resource_name: impl Into<String>,
        instance: BlockInstanceDetails,
    ) -> Self {
        self.config
            .providers
            .entry(resource_name.into())
            .or_default()
            .push(instance);
        self
    }

    /// Регистрирует экземпляр блока для ресурса-потребителя.
    pub fn with_consumer_instance(
        mut self,
        resource_name: impl Into<String>,
        instance: BlockInstance,
    ) -> Self {
        self.config
            .consumers
            .insert(resource_name.into(), instance);
        self
    }

    pub fn config(&self) -> &StaticConfig {
        &self.config
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn get_instances_for_provider(
        &self,
        resource_name: &str,
    ) -> Result<Vec<BlockInstanceDetails>, ProviderError> {
        Ok(self
            .config
            .providers
            .get(resource_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_instance_for_consumer(
        &self,
        resource_name: &str,
    ) -> Result<BlockInstance, ProviderError> {
        self.config
            .consumers
            .get(resource_name)
            .cloned()
            .ok_or_else(|| format!("no block instance registered for consumer {resource_name}").into())
    }
}
