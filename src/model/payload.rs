use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Заголовки сообщения: плоское отображение строк, передаётся брокеру как
/// атрибуты без изменений.
pub type Headers = HashMap<String, String>;

/// Типизированный конверт сообщения: данные и заголовки.
///
/// Для публикации создаётся вызывающим кодом; при приёме собирается заново
/// для каждого сообщения и передаётся обработчику по значению.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload<T> {
    pub data: T,
    #[serde(default)]
    pub headers: Headers,
}

impl<T> Payload<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            headers: Headers::new(),
        }
    }

    pub fn with_headers(
        data: T,
        headers: Headers,
    ) -> Self {
        Self { data, headers }
    }

    /// Добавляет заголовок (перезаписывает существующий с тем же ключом).
    pub fn header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn into_parts(self) -> (T, Headers) {
        (self.data, self.headers)
    }
}
