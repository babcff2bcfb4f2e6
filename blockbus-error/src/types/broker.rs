use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Тип ресурса брокера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Topic,
    Subscription,
}

/// Ошибки взаимодействия с брокером (проверка/создание ресурсов,
/// публикация, подписка).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Не удалось подключиться к брокеру
    Connect { reason: String },
    /// Topic не существует
    TopicNotFound { topic: String },
    /// Subscription не существует
    SubscriptionNotFound { subscription: String },
    /// Ресурс уже создан (гонка при создании)
    AlreadyExists { kind: ResourceKind, name: String },
    /// Брокер отклонил публикацию
    Publish { topic: String, reason: String },
    /// Сбой подписки или потока сообщений
    Subscribe {
        subscription: String,
        reason: String,
    },
    /// Прочие транспортные сбои
    Transport { reason: String },
    /// Клиент брокера уже освобождён
    ClientClosed,
}

impl BrokerError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Topic => write!(f, "topic"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

impl std::fmt::Display for BrokerError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Connect { reason } => write!(f, "Failed to connect to broker: {reason}"),
            Self::TopicNotFound { topic } => write!(f, "Topic not found: {topic}"),
            Self::SubscriptionNotFound { subscription } => {
                write!(f, "Subscription not found: {subscription}")
            }
            Self::AlreadyExists { kind, name } => write!(f, "The {kind} {name} already exists"),
            Self::Publish { topic, reason } => {
                write!(f, "Publish to {topic} failed: {reason}")
            }
            Self::Subscribe {
                subscription,
                reason,
            } => write!(f, "Receive from {subscription} failed: {reason}"),
            Self::Transport { reason } => write!(f, "Broker transport error: {reason}"),
            Self::ClientClosed => write!(f, "Broker client is closed"),
        }
    }
}

impl std::error::Error for BrokerError {}

impl ErrorExt for BrokerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Connect { .. } | Self::Transport { .. } => StatusCode::ConnectionFailed,
            Self::TopicNotFound { .. } | Self::SubscriptionNotFound { .. } => StatusCode::NotFound,
            Self::AlreadyExists { .. } => StatusCode::AlreadyExists,
            Self::Publish { .. } => StatusCode::PublishFailed,
            Self::Subscribe { .. } => StatusCode::SubscribeFailed,
            Self::ClientClosed => StatusCode::ConnectionClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "broker".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::TopicNotFound { topic } | Self::Publish { topic, .. } => {
                tags.push(("topic", topic.clone()));
            }
            Self::SubscriptionNotFound { subscription } | Self::Subscribe { subscription, .. } => {
                tags.push(("subscription", subscription.clone()));
            }
            Self::AlreadyExists { kind, name } => {
                tags.push(("resource_kind", kind.to_string()));
                tags.push(("resource", name.clone()));
            }
            _ => {}
        }

        tags
    }
}
