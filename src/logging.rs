use std::path::PathBuf;
use tracing::info;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LogSettings;
use crate::error::{SyncError, SyncResult};

/// Logging configuration for the highlight engine
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LogSettings::default().into()
    }
}

impl From<LogSettings> for LoggingConfig {
    fn from(s: LogSettings) -> Self {
        Self {
            level: s.level,
            log_dir: s.log_dir,
            enable_file_logging: s.enable_file_logging,
            enable_json_format: s.enable_json_format,
        }
    }
}

/// Keeps the non-blocking file writer alive; drop it to flush
#[derive(Default)]
pub struct LogGuard {
    #[cfg(feature = "advanced_logging")]
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chonker_highlight={},warn", level)))
}

fn console_layer<S>() -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .boxed()
}

/// Initialize logging. Fails with a configuration error when a global
/// subscriber is already installed; the existing one stays in place.
pub fn init_logging(config: &LoggingConfig) -> SyncResult<LogGuard> {
    let registry = Registry::default().with(env_filter(&config.level));

    #[cfg(feature = "advanced_logging")]
    if config.enable_file_logging {
        std::fs::create_dir_all(&config.log_dir)
            .map_err(|e| SyncError::file_io(config.log_dir.to_string_lossy().to_string(), e))?;

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "chonker-highlight.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = if config.enable_json_format {
            fmt::layer().json().with_writer(file_writer).boxed()
        } else {
            fmt::layer().with_writer(file_writer).with_ansi(false).boxed()
        };

        registry
            .with(file_layer)
            .with(console_layer())
            .try_init()
            .map_err(|e| SyncError::configuration(format!("logging already initialized: {}", e)))?;

        info!("🐹 CHONKER highlight logging initialized");
        info!("File logging enabled: {}", config.log_dir.display());
        return Ok(LogGuard { _file: Some(guard) });
    }

    registry
        .with(console_layer())
        .try_init()
        .map_err(|e| SyncError::configuration(format!("logging already initialized: {}", e)))?;

    info!("🐹 CHONKER highlight logging initialized");
    info!("Log level: {}", config.level);
    if config.enable_file_logging && !cfg!(feature = "advanced_logging") {
        tracing::warn!("File logging requested but the advanced_logging feature is off");
    }

    Ok(LogGuard::default())
}

/// Performance logging utilities
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!("⏱️  Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!("⏱️  Completed {}: {:.2}ms", self.operation, elapsed.as_secs_f64() * 1000.0);
    }
}

/// Macro for logging with context
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            recoverable = $error.is_recoverable(),
            "CHONKER highlight error occurred"
        );
    };
}
