use std::{any::Any, sync::Arc};

use crate::{ErrorExt, StatusCode};

/// Непрозрачная ошибка внешнего провайдера конфигурации.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Роль записи в блоке, для которой выполнялся поиск.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Provider,
    Consumer,
}

/// Ошибки разрешения логического имени ресурса в topic/subscription.
#[derive(Debug, Clone)]
pub enum ResolutionError {
    /// Провайдер конфигурации не вернул ни одного соединения
    NoConnection { resource: String },
    /// В блоке нет записи с нужным именем
    EntryNotFound { resource: String, kind: EntryKind },
    /// Узел конфигурации не соответствует форме определения блока
    Decode { resource: String, reason: String },
    /// Запись найдена, но нарушает инварианты (пустой topic/subscription)
    InvalidEntry { resource: String, reason: String },
    /// Ошибка провайдера конфигурации (передаётся без изменений)
    Provider {
        resource: String,
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl ResolutionError {
    /// Оборачивает ошибку провайдера конфигурации.
    pub fn provider(
        resource: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        Self::Provider {
            resource: resource.into(),
            source: Arc::from(source),
        }
    }

    /// Имя ресурса, для которого выполнялось разрешение.
    pub fn resource(&self) -> &str {
        match self {
            Self::NoConnection { resource }
            | Self::EntryNotFound { resource, .. }
            | Self::Decode { resource, .. }
            | Self::InvalidEntry { resource, .. }
            | Self::Provider { resource, .. } => resource,
        }
    }

    /// `true`, если ошибка означает отсутствие записи/соединения.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoConnection { .. } | Self::EntryNotFound { .. }
        )
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Provider => write!(f, "provider"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

impl std::fmt::Display for ResolutionError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::NoConnection { resource } => {
                write!(f, "No connection found for {resource}")
            }
            Self::EntryNotFound { resource, kind } => {
                write!(f, "No {kind} entry found for {resource}")
            }
            Self::Decode { resource, reason } => {
                write!(f, "Failed to decode block definition for {resource}: {reason}")
            }
            Self::InvalidEntry { resource, reason } => {
                write!(f, "Invalid entry for {resource}: {reason}")
            }
            Self::Provider { resource, source } => {
                write!(f, "Config provider failed for {resource}: {source}")
            }
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Provider { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl ErrorExt for ResolutionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoConnection { .. } => StatusCode::NoConnection,
            Self::EntryNotFound { .. } => StatusCode::NotFound,
            Self::Decode { .. } | Self::InvalidEntry { .. } => StatusCode::InvalidData,
            Self::Provider { .. } => StatusCode::ConfigProviderFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "resolution".to_string()),
            ("status_code", self.status_code().to_string()),
            ("resource", self.resource().to_string()),
        ];
        if let Self::EntryNotFound { kind, .. } = self {
            tags.push(("entry_kind", kind.to_string()));
        }
        tags
    }
}
