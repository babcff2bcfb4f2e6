use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::LoggingError;

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Формат строк лога.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки вывода в консоль.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки файлового лога (ежедневная ротация).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub format: LogFormat,
    /// Префикс имени файла; к нему добавляется дата
    pub filename_prefix: String,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень по умолчанию (`trace`..`error`, `off`)
    pub level: String,
    pub log_dir: PathBuf,
    pub console: ConsoleConfig,
    pub file: FileConfig,
    /// Уровни для отдельных модулей: `{"blockbus::broker": "debug"}`
    pub module_levels: BTreeMap<String, String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: LogFormat::Json,
            filename_prefix: "blockbus.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            module_levels: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Переопределения из окружения: `BLOCKBUS_LOG_LEVEL`,
    /// `BLOCKBUS_LOG_FORMAT`, `BLOCKBUS_LOG_DIR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("BLOCKBUS_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Ok(format) = std::env::var("BLOCKBUS_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.console.format = format;
            }
        }
        if let Ok(dir) = std::env::var("BLOCKBUS_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
            self.file.enabled = true;
        }
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        check_level(&self.level)?;
        for level in self.module_levels.values() {
            check_level(level)?;
        }
        if self.file.enabled && self.file.filename_prefix.trim().is_empty() {
            return Err(LoggingError::InvalidConfig(
                "file.filename_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Директива для `EnvFilter`: `"info,blockbus::broker=debug"`.
    pub fn build_filter_directive(&self) -> String {
        let mut directive = self.level.clone();
        for (module, level) in &self.module_levels {
            directive.push(',');
            directive.push_str(module);
            directive.push('=');
            directive.push_str(level);
        }
        directive
    }

    /// Создаёт каталог логов, если включён файловый вывод.
    pub fn ensure_log_dir(&self) -> Result<(), LoggingError> {
        if self.file.enabled {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }
}

fn check_level(level: &str) -> Result<(), LoggingError> {
    if LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(LoggingError::InvalidLevel(level.to_string()))
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::InvalidConfig(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Compact => f.write_str("compact"),
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}
