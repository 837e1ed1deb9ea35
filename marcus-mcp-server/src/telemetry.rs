//! Tracing/logging setup for the `logging` config block: a rolling file
//! appender when `logging.directory` is set, stdout otherwise, in whichever
//! of pretty/json/compact the config picks.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{Config, LogFormat, LoggingConfig};

/// Holds the non-blocking writer's background flush thread alive; dropping
/// it stops log delivery, so `main` keeps it bound for the process lifetime.
#[allow(dead_code)]
pub struct TelemetryGuard(Option<WorkerGuard>);

/// Initialize the tracing subscriber. Returns a guard that must be kept
/// alive for the duration of the process when logging to a file.
pub fn init_telemetry(config: &LoggingConfig) -> Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level configuration")?;

    let registry = Registry::default().with(env_filter);

    let (writer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("failed to create log directory: {dir}"))?;
            let file_appender = tracing_appender::rolling::daily(dir, "marcus.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (non_blocking, Some(guard))
        }
        None => {
            let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
            (non_blocking, Some(guard))
        }
    };

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(writer);
            registry.with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_writer(writer);
            registry.with(fmt_layer).init();
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(writer);
            registry.with(fmt_layer).init();
        }
    }

    tracing::info!(log_level = %config.level, log_format = ?config.format, "telemetry initialized");

    Ok(TelemetryGuard(guard))
}

/// Logs the resolved configuration at startup, excluding secrets (provider
/// tokens are never logged).
pub fn log_startup_info(config: &Config) {
    tracing::info!(
        provider = ?config.provider,
        ai_enabled = config.ai.enabled,
        stale_ttl_seconds = config.assignment.stale_ttl_seconds,
        tool_deadline_ms = config.tool_dispatcher.deadline_ms,
        "marcus coordinator starting up"
    );
}

pub fn log_config_validation(config: &Config) {
    match config.validate() {
        Ok(()) => tracing::info!("configuration validation passed"),
        Err(e) => tracing::error!(error = %e, "configuration validation failed"),
    }
}

/// Performance monitoring helper for long-running operations (provider
/// calls, reconciliation sweeps).
#[allow(dead_code)]
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    #[allow(dead_code)]
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!(operation = %operation, "starting performance timer");
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    #[allow(dead_code)]
    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::info!(operation = %self.operation, duration_ms = duration.as_millis(), "operation completed");
        if duration.as_millis() > 1000 {
            tracing::warn!(operation = %self.operation, duration_ms = duration.as_millis(), "slow operation detected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_timer() {
        let timer = PerformanceTimer::new("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(5));
        timer.finish();
    }
}
