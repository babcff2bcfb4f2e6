use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления жизненным циклом логирования.
///
/// Держит guard неблокирующего файлового writer-а: пока handle жив, записи
/// уходят в фоновый поток; при shutdown/drop буфер сбрасывается на диск.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    shutdown_in_progress: Arc<AtomicBool>,
    flush_timeout: Duration,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            shutdown_in_progress: Arc::new(AtomicBool::new(false)),
            flush_timeout: Duration::from_secs(5),
        }
    }

    /// Устанавливает timeout для flush при shutdown.
    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    pub fn is_shutdown_in_progress(&self) -> bool {
        self.shutdown_in_progress.load(Ordering::Acquire)
    }

    /// Сбрасывает буферы и завершает фоновый writer.
    pub fn shutdown(mut self) {
        self.shutdown_in_progress.store(true, Ordering::Release);
        tracing::info!(
            timeout_ms = self.flush_timeout.as_millis() as u64,
            "Initiating logging shutdown"
        );

        let start = Instant::now();
        drop(self.file_guard.take());
        let elapsed = start.elapsed();

        if elapsed > self.flush_timeout {
            eprintln!(
                "WARNING: Logging shutdown took {}ms (timeout: {}ms)",
                elapsed.as_millis(),
                self.flush_timeout.as_millis()
            );
        }
    }

    /// Shutdown в async-контексте: сброс буфера выполняется в блокирующем
    /// потоке и ограничен `timeout`.
    pub async fn shutdown_async(
        mut self,
        timeout: Duration,
    ) {
        self.shutdown_in_progress.store(true, Ordering::Release);
        let file_guard = self.file_guard.take();

        match tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || drop(file_guard)),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("Logging shutdown task panicked: {e}"),
            Err(_) => eprintln!(
                "WARNING: Logging shutdown exceeded timeout of {}ms",
                timeout.as_millis()
            ),
        }
    }
}

impl Drop for LoggingHandle {
    fn drop(&mut self) {
        if self.file_guard.is_some() && !self.is_shutdown_in_progress() {
            eprintln!(
                "WARNING: LoggingHandle dropped without explicit shutdown(). \
                 Call .shutdown() for graceful cleanup."
            );
        }
    }
}
