use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Использование Publisher/Consumer после освобождения клиента брокера.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedError {
    /// Компонент, который уже закрыт (`"publisher"` или `"consumer"`)
    pub component: &'static str,
    /// Topic или subscription, к которому был привязан компонент
    pub name: String,
}

impl ClosedError {
    pub fn new(
        component: &'static str,
        name: impl Into<String>,
    ) -> Self {
        Self {
            component,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ClosedError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "The {} for {} is closed", self.component, self.name)
    }
}

impl std::error::Error for ClosedError {}

impl ErrorExt for ClosedError {
    fn status_code(&self) -> StatusCode {
        StatusCode::Closed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_error_display() {
        let err = ClosedError::new("publisher", "orders");
        assert_eq!(err.to_string(), "The publisher for orders is closed");
        assert_eq!(err.status_code(), StatusCode::Closed);
    }
}
