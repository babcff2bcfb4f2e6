//! Инициализация `tracing`: фильтр уровней, вывод в консоль и в файл с
//! ежедневной ротацией.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use crate::error::LoggingError;

/// Устанавливает глобальный subscriber по конфигурации.
///
/// Переменные `BLOCKBUS_LOG_*` переопределяют конфигурацию, `RUST_LOG`
/// переопределяет уровни. Возвращённый handle нужно держать до завершения
/// процесса.
pub fn init_logging(mut config: LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    config.apply_env_overrides();
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter(&config);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console.enabled {
        layers.push(sinks::console::layer(&config));
    }

    let file_guard = if config.file.enabled {
        let (file_layer, guard) = sinks::file::layer(&config);
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        console_format = %config.console.format,
        file_enabled = config.file.enabled,
        log_dir = %config.log_dir.display(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
