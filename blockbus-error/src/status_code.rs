use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Разрешение ресурсов (конфигурация блоков)
/// - 5xxx: Сериализация payload
/// - 6xxx: Брокер / транспорт
/// - 9xxx: Жизненный цикл Publisher/Consumer
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации в виде числового значения
///   (feature = "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Разрешение ресурсов ===
    NotFound = 2000,
    AlreadyExists = 2001,
    InvalidData = 2009,
    NoConnection = 2100,
    ConfigProviderFailed = 2101,

    // === 5xxx: Сериализация ===
    SerializationFailed = 5003,
    DeserializationFailed = 5004,

    // === 6xxx: Брокер/транспорт ===
    ConnectionClosed = 6001,
    Timeout = 6002,
    ConnectionFailed = 6004,
    PublishFailed = 6010,
    SubscribeFailed = 6011,

    // === 9xxx: Жизненный цикл ===
    Closed = 9000,
    Busy = 9001,
    RetriesExhausted = 9002,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    ///
    /// Использует `TryFrom<u32>` из `num_enum`; возвращает `None`, если
    /// значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Возвращает `true`, если операцию с этим кодом имеет смысл повторить.
    ///
    /// Используется циклом приёма сообщений: транспортные сбои повторяются
    /// с backoff, ошибки конфигурации не повторяются.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionFailed
                | Self::ConnectionClosed
                | Self::PublishFailed
                | Self::SubscribeFailed
        )
    }

    /// Ошибка вызвана некорректной конфигурацией или входными данными.
    pub fn is_client_error(&self) -> bool {
        let code = self.code();
        (1004..3000).contains(&code) || (5000..6000).contains(&code)
    }

    /// Проверяет, является ли ошибка критичной.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::RetriesExhausted)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::AlreadyExists => LogLevel::Debug,
            Self::InvalidArgs | Self::InvalidData | Self::NoConnection | Self::Closed => {
                LogLevel::Info
            }
            Self::Timeout
            | Self::ConnectionClosed
            | Self::SerializationFailed
            | Self::DeserializationFailed => LogLevel::Warn,
            Self::Internal | Self::RetriesExhausted => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
