use std::io;

use thiserror::Error;

pub use blockbus_error::{
    BrokerError, ClosedError, ConsumerError, EntryKind, ErrorExt, ResolutionError, ResourceKind,
    SerializationError, StatusCode,
};

pub type PubSubResult<T> = Result<T, PubSubError>;

/// Общая ошибка Publisher/Consumer.
#[derive(Error, Debug)]
pub enum PubSubError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Broker(BrokerError),

    #[error(transparent)]
    Closed(#[from] ClosedError),

    #[error(transparent)]
    Consumer(#[from] ConsumerError),
}

/// Ошибка загрузки статической конфигурации блоков.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid config document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ошибка инициализации логирования.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Invalid logging config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Global subscriber is already set: {0}")]
    AlreadyInitialized(String),
}

impl From<BrokerError> for PubSubError {
    fn from(err: BrokerError) -> Self {
        match err {
            // Клиент без привязки к ресурсу; имя уточняет вызывающий код
            BrokerError::ClientClosed => Self::Closed(ClosedError::new("broker client", "")),
            other => Self::Broker(other),
        }
    }
}

impl PubSubError {
    fn inner(&self) -> &dyn ErrorExt {
        match self {
            Self::Resolution(e) => e,
            Self::Serialization(e) => e,
            Self::Broker(e) => e,
            Self::Closed(e) => e,
            Self::Consumer(e) => e,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Подменяет безымянную ошибку закрытого клиента ошибкой конкретного
    /// компонента.
    pub(crate) fn closed_as(
        self,
        component: &'static str,
        name: &str,
    ) -> Self {
        match self {
            Self::Closed(_) => Self::Closed(ClosedError::new(component, name)),
            other => other,
        }
    }
}

impl ErrorExt for PubSubError {
    fn status_code(&self) -> StatusCode {
        self.inner().status_code()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn client_message(&self) -> String {
        self.inner().client_message()
    }

    fn log_message(&self) -> String {
        self.inner().log_message()
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        self.inner().metrics_tags()
    }
}
