use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий интерфейс ошибок blockbus. Трейт object-safe, поэтому ошибки
/// разных слоёв (брокер, разрешение, кодек) можно держать как
/// `&dyn ErrorExt` и классифицировать по [`StatusCode`].
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Код для классификации; без переопределения [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Для downcast к конкретному типу ошибки.
    fn as_any(&self) -> &dyn Any;

    /// Текст для вызывающего кода. Внутренние коды сворачиваются в
    /// `"Internal error"`, остальные отдают `Display`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// `Debug`-представление для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Пары `error_type`/`status_code` для полей tracing.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Последний сегмент пути типа.
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}
