//! Конфигурация: внешний провайдер описаний блоков, статический провайдер
//! для тестов и однопроцессных развёртываний, а также рабочие настройки
//! Publisher/Consumer.

pub mod provider;
pub mod retry;
pub mod settings;
pub mod static_provider;

pub use provider::*;
pub use retry::*;
pub use settings::*;
pub use static_provider::*;
