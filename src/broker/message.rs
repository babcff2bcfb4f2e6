use std::fmt;

use bytes::Bytes;

use crate::model::Headers;

/// Сообщение, отправляемое брокеру: тело и атрибуты.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub data: Bytes,
    pub attributes: Headers,
}

impl OutboundMessage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            attributes: Headers::new(),
        }
    }

    pub fn with_attributes(
        data: impl Into<Bytes>,
        attributes: Headers,
    ) -> Self {
        Self {
            data: data.into(),
            attributes,
        }
    }
}

/// Подтверждение доставки на стороне конкретного брокера.
///
/// Оба метода потребляют обработчик, поэтому сообщение подтверждается или
/// отклоняется ровно один раз.
pub trait AckHandler: Send {
    fn ack(self: Box<Self>);
    fn nack(self: Box<Self>);
}

/// Сообщение, полученное из подписки.
pub struct ReceivedMessage {
    /// Идентификатор, присвоенный брокером
    pub id: String,
    pub data: Bytes,
    pub attributes: Headers,
    /// Номер попытки доставки, начиная с 1
    pub delivery_attempt: u32,
    handler: Box<dyn AckHandler>,
}

impl ReceivedMessage {
    pub fn new(
        id: impl Into<String>,
        data: Bytes,
        attributes: Headers,
        delivery_attempt: u32,
        handler: Box<dyn AckHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            data,
            attributes,
            delivery_attempt,
            handler,
        }
    }

    /// Подтверждает обработку: брокер больше не доставит сообщение.
    pub fn ack(self) {
        self.handler.ack();
    }

    /// Отклоняет сообщение: брокер доставит его повторно.
    pub fn nack(self) {
        self.handler.nack();
    }
}

impl fmt::Debug for ReceivedMessage {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ReceivedMessage")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .field("attributes", &self.attributes)
            .field("delivery_attempt", &self.delivery_attempt)
            .finish_non_exhaustive()
    }
}
