use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use super::RetryPolicy;
use crate::pubsub::Encoding;

/// Переменная окружения с путём к файлу настроек.
pub const CONFIG_PATH_ENV: &str = "BLOCKBUS_CONFIG";

/// Префикс переменных окружения (`BLOCKBUS_CONSUMER__DRAIN_TIMEOUT_MS=...`).
pub const ENV_PREFIX: &str = "BLOCKBUS";

/// Настройки цикла приёма сообщений.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSettings {
    /// Сколько сообщений может обрабатываться одновременно
    #[serde(default = "ConsumerSettings::default_max_outstanding_messages")]
    pub max_outstanding_messages: usize,

    /// Сколько ждать завершения обработчиков после отмены
    #[serde(default = "ConsumerSettings::default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Рабочие настройки Publisher/Consumer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub consumer: ConsumerSettings,
    #[serde(default)]
    pub encoding: Encoding,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            max_outstanding_messages: Self::default_max_outstanding_messages(),
            drain_timeout_ms: Self::default_drain_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ConsumerSettings {
    fn default_max_outstanding_messages() -> usize {
        64
    }

    fn default_drain_timeout_ms() -> u64 {
        5_000
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Лимит параллельных обработчиков, не меньше единицы.
    pub fn concurrency(&self) -> usize {
        self.max_outstanding_messages.max(1)
    }
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, затем файл из
    /// `BLOCKBUS_CONFIG` (если задан), затем переменные окружения.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref())
    }

    /// То же, что [`Settings::load`], но с явным путём к файлу.
    pub fn load_from(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Значения по умолчанию
            .set_default("encoding", "json")?
            .set_default(
                "consumer.max_outstanding_messages",
                ConsumerSettings::default_max_outstanding_messages() as i64,
            )?
            .set_default(
                "consumer.drain_timeout_ms",
                ConsumerSettings::default_drain_timeout_ms() as i64,
            )?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let cfg = builder
            // Переменные окружения с префиксом BLOCKBUS_, вложенность через `__`
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }
}
