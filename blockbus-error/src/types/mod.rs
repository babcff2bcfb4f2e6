pub mod broker;
pub mod closed;
pub mod consumer;
pub mod resolution;
pub mod serialization;

// Публичный экспорт всех типов ошибок из вложенных модулей, чтобы упростить
// доступ к ним из внешнего кода.
pub use broker::*;
pub use closed::*;
pub use consumer::*;
pub use resolution::*;
pub use serialization::*;
