use std::any::Any;

use crate::{BrokerError, ErrorExt, StatusCode};

/// Ошибки цикла приёма сообщений.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// Цикл приёма уже запущен для этого Consumer
    AlreadyReceiving { subscription: String },
    /// Политика повторов исчерпана, цикл остановлен
    RetriesExhausted {
        subscription: String,
        attempts: u32,
        last_error: BrokerError,
    },
}

impl std::fmt::Display for ConsumerError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::AlreadyReceiving { subscription } => {
                write!(f, "Already receiving messages from {subscription}")
            }
            Self::RetriesExhausted {
                subscription,
                attempts,
                last_error,
            } => write!(
                f,
                "Gave up receiving from {subscription} after {attempts} attempts: {last_error}"
            ),
        }
    }
}

impl std::error::Error for ConsumerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RetriesExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}

impl ErrorExt for ConsumerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyReceiving { .. } => StatusCode::Busy,
            Self::RetriesExhausted { .. } => StatusCode::RetriesExhausted,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "consumer".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::RetriesExhausted { attempts, .. } = self {
            tags.push(("attempts", attempts.to_string()));
        }
        tags
    }
}
