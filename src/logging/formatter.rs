use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer,
    registry::LookupSpan,
};

use crate::logging::config::{ConsoleConfig, LogFormat};

/// Boxed fmt-слой заданного формата.
///
/// Тип стирается, чтобы json/pretty/compact можно было выбрать во время
/// выполнения.
pub fn build_layer<S, W>(
    format: LogFormat,
    options: &ConsoleConfig,
    with_ansi: bool,
    writer: W,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(with_ansi)
        .with_target(options.with_target)
        .with_thread_ids(options.with_thread_ids)
        .with_line_number(options.with_line_numbers);

    match format {
        LogFormat::Json => Box::new(
            base.event_format(fmt::format().json().with_current_span(true))
                .fmt_fields(fmt::format::JsonFields::new()),
        ),
        LogFormat::Pretty => Box::new(
            base.event_format(fmt::format().pretty())
                .with_span_events(FmtSpan::CLOSE),
        ),
        LogFormat::Compact => Box::new(base.event_format(fmt::format().compact())),
    }
}
