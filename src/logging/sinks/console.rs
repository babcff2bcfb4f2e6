use std::io::{self, Stdout};

use tracing_subscriber::{layer::Layer, registry::LookupSpan};

use crate::logging::{config::LoggingConfig, formatter};

/// Console layer с форматом и флагами из конфигурации.
pub fn layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    // Явно указываем writer как fn() -> Stdout
    let writer: fn() -> Stdout = io::stdout;
    formatter::build_layer(
        config.console.format,
        &config.console,
        config.console.with_ansi,
        writer,
    )
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;
    use crate::logging::config::{ConsoleConfig, LogFormat};

    /// Тест проверят, что console layer можно зарегистрировать для каждого
    /// формата и что вызов логирования не приводит к панике.
    #[test]
    fn test_layer_registers_and_logs_without_panic() {
        for format in [LogFormat::Compact, LogFormat::Pretty, LogFormat::Json] {
            let config = LoggingConfig {
                console: ConsoleConfig {
                    format,
                    with_ansi: false,
                    ..Default::default()
                },
                ..Default::default()
            };
            let subscriber = Registry::default().with(layer::<Registry>(&config));
            tracing::subscriber::with_default(subscriber, || {
                info!(%format, "console layer smoke test");
            });
        }
    }
}
