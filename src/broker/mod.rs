//! Контракт брокера: подключение, управление topic/subscription,
//! публикация и поток входящих сообщений.
//!
//! Ядро работает только через эти трейты; встроенная реализация в памяти
//! находится в [`memory`].

pub mod memory;
pub mod message;
pub mod provision;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::{InMemoryBroker, MemoryConnector, SubscriptionStats};
pub use message::{AckHandler, OutboundMessage, ReceivedMessage};
pub use provision::{ensure_subscription, ensure_topic};

use crate::error::BrokerError;

/// Источник клиентов брокера.
///
/// Каждый Publisher/Consumer получает собственный клиент и освобождает его
/// при закрытии.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BrokerClient>, BrokerError>;
}

/// Клиент брокера.
///
/// Создание существующего ресурса завершается `BrokerError::AlreadyExists`.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn topic_exists(
        &self,
        topic: &str,
    ) -> Result<bool, BrokerError>;

    async fn create_topic(
        &self,
        topic: &str,
    ) -> Result<(), BrokerError>;

    async fn subscription_exists(
        &self,
        subscription: &str,
    ) -> Result<bool, BrokerError>;

    async fn create_subscription(
        &self,
        subscription: &str,
        topic: &str,
    ) -> Result<(), BrokerError>;

    /// Публикует сообщение и возвращает идентификатор, присвоенный брокером.
    async fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
    ) -> Result<String, BrokerError>;

    async fn subscribe(
        &self,
        subscription: &str,
    ) -> Result<Box<dyn MessageStream>, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// Поток сообщений одной подписки.
#[async_trait]
pub trait MessageStream: Send {
    /// Следующее сообщение; `Ok(None)`, если поток завершился без ошибки.
    async fn next_message(&mut self) -> Result<Option<ReceivedMessage>, BrokerError>;
}

#[async_trait]
impl<C: BrokerConnector + ?Sized> BrokerConnector for Arc<C> {
    async fn connect(&self) -> Result<Box<dyn BrokerClient>, BrokerError> {
        (**self).connect().await
    }
}
