//! Модель ресурсов: декларативное определение блока, записи
//! providers/consumers и типизированный конверт сообщения.

pub mod block;
pub mod payload;

pub use block::*;
pub use payload::*;
