use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::Layer, registry::LookupSpan};

use crate::logging::{config::LoggingConfig, formatter};

/// Файловый layer с ежедневной ротацией и неблокирующей записью.
///
/// `WorkerGuard` нужно держать до завершения работы: при его drop
/// буфер сбрасывается на диск.
pub fn layer<S>(config: &LoggingConfig) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = rolling::daily(&config.log_dir, &config.file.filename_prefix);
    let (writer, guard) = non_blocking(appender);

    let layer = formatter::build_layer(config.file.format, &config.console, false, writer);
    (layer, guard)
}
