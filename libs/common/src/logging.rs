//! Unified logging setup for the sync services
//!
//! Console output uses a bracketed level format; an optional file layer
//! writes through a non-blocking daily-rolling appender.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::TRACE => "\x1b[35m", // magenta
        Level::DEBUG => "\x1b[34m", // blue
        Level::INFO => "\x1b[32m",  // green
        Level::WARN => "\x1b[33m",  // yellow
        Level::ERROR => "\x1b[31m", // red
    }
}

/// Event formatter producing `timestamp [LEVEL] message` lines, like
/// `2025-12-02T00:50:44.809123Z [INFO] Service started`.
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            write!(writer, "{}{}\x1b[0m ", level_color(level), level_tag(level))?;
        } else {
            write!(writer, "{} ", level_tag(level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used for the log file name
    pub service_name: String,
    /// Directory for file logs; `None` keeps console-only logging
    pub log_dir: Option<PathBuf>,
    /// Default filter directives applied when `RUST_LOG` is not set
    pub default_filter: String,
    /// Write the file layer as JSON instead of the bracketed format
    pub enable_json: bool,
}

impl LogConfig {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            log_dir: None,
            default_filter: format!("info,{service_name}=info"),
            enable_json: false,
        }
    }
}

/// Initialize the tracing subscriber for a service.
///
/// Console output is always enabled. When `log_dir` is set, a second layer
/// writes to `{log_dir}/{service_name}.log` with daily rotation through a
/// non-blocking appender; the returned guard must be held for the process
/// lifetime or buffered lines are lost on exit.
pub fn init(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketedLevelFormat)
        .boxed();

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = if config.enable_json {
                fmt::layer().json().with_writer(non_blocking).boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_tags() {
        assert_eq!(level_tag(Level::INFO), "[INFO]");
        assert_eq!(level_tag(Level::ERROR), "[ERROR]");
    }

    #[test]
    fn test_default_filter_scopes_service() {
        let config = LogConfig::new("syncsrv");
        assert_eq!(config.default_filter, "info,syncsrv=info");
        assert!(config.log_dir.is_none());
        assert!(!config.enable_json);
    }
}
