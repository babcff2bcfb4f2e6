use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки кодирования/декодирования типизированного payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Не удалось закодировать значение перед отправкой
    Encode { type_name: String, reason: String },
    /// Тело сообщения не соответствует ожидаемому типу
    Decode { type_name: String, reason: String },
}

impl SerializationError {
    pub fn encode<T: ?Sized>(reason: impl ToString) -> Self {
        Self::Encode {
            type_name: std::any::type_name::<T>().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode<T: ?Sized>(reason: impl ToString) -> Self {
        Self::Decode {
            type_name: std::any::type_name::<T>().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Encode { type_name, reason } => {
                write!(f, "Failed to encode {type_name}: {reason}")
            }
            Self::Decode { type_name, reason } => {
                write!(f, "Failed to decode {type_name}: {reason}")
            }
        }
    }
}

impl std::error::Error for SerializationError {}

impl ErrorExt for SerializationError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Encode { .. } => StatusCode::SerializationFailed,
            Self::Decode { .. } => StatusCode::DeserializationFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Encode { .. } => "Payload encoding failed".to_string(),
            Self::Decode { .. } => "Message format error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_capture_type_name() {
        let err = SerializationError::decode::<u64>("invalid type: string");
        assert_eq!(err.status_code(), StatusCode::DeserializationFailed);
        assert!(err.to_string().starts_with("Failed to decode u64"));

        let err = SerializationError::encode::<str>("boom");
        assert_eq!(err.status_code(), StatusCode::SerializationFailed);
        assert_eq!(err.client_message(), "Payload encoding failed");
    }
}
