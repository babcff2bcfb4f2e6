use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// `RUST_LOG`, если задана и корректна, иначе директива из конфигурации.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = config.build_filter_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    })
}
