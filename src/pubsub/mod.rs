//! Типизированные Publisher и Consumer поверх контракта брокера.

pub mod codec;
pub mod consumer;
pub mod handler;
pub mod publisher;

pub use codec::Encoding;
pub use consumer::{Consumer, ConsumerFailure, ConsumerState};
pub use handler::{HandlerError, MessageHandler};
pub use publisher::Publisher;
