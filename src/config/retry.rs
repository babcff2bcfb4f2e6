use std::time::Duration;

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

/// Политика повторов цикла приёма: экспоненциальный backoff плюс лимит
/// попыток.
///
/// Попыткой считается каждый сбой подписки или потока сообщений подряд;
/// успешная подписка сбрасывает счётчик.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Сколько сбоев подряд допускается до остановки (`None`: без ограничения)
    #[serde(default = "RetryPolicy::default_max_attempts")]
    pub max_attempts: Option<u32>,

    /// Начальный интервал в миллисекундах
    #[serde(default = "RetryPolicy::default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Верхняя граница интервала в миллисекундах
    #[serde(default = "RetryPolicy::default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Доля случайного разброса в диапазоне [0.0, 1.0]
    #[serde(default = "RetryPolicy::default_randomization_factor")]
    pub randomization_factor: f64,

    /// Множитель интервала на каждом шаге
    #[serde(default = "RetryPolicy::default_multiplier")]
    pub multiplier: f64,

    /// Общий лимит времени на повторы (`None`: без ограничения)
    #[serde(default)]
    pub max_elapsed_time_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_interval_ms: Self::default_initial_interval_ms(),
            max_interval_ms: Self::default_max_interval_ms(),
            randomization_factor: Self::default_randomization_factor(),
            multiplier: Self::default_multiplier(),
            max_elapsed_time_ms: None,
        }
    }
}

impl RetryPolicy {
    fn default_max_attempts() -> Option<u32> {
        Some(10)
    }

    fn default_initial_interval_ms() -> u64 {
        500
    }

    fn default_max_interval_ms() -> u64 {
        30_000
    }

    fn default_randomization_factor() -> f64 {
        0.2
    }

    fn default_multiplier() -> f64 {
        2.0
    }

    /// Без повторов: первый же транспортный сбой завершает цикл.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(0),
            ..Default::default()
        }
    }

    /// Бесконечные повторы.
    pub fn unlimited() -> Self {
        Self {
            max_attempts: None,
            max_elapsed_time_ms: None,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..Default::default()
        }
    }

    /// Можно ли сделать ещё одну попытку после `failures` сбоев подряд.
    pub fn allows(
        &self,
        failures: u32,
    ) -> bool {
        match self.max_attempts {
            None => true,
            Some(max) => failures <= max,
        }
    }

    /// Строит `ExponentialBackoff` с нормализованными параметрами.
    pub fn backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.initial_interval_ms.max(1));
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: Duration::from_millis(self.max_interval_ms).max(initial),
            randomization_factor: self.randomization_factor.clamp(0.0, 1.0),
            multiplier: self.multiplier.max(1.0),
            max_elapsed_time: self.max_elapsed_time_ms.map(Duration::from_millis),
            ..ExponentialBackoff::default()
        }
    }
}
