use std::fmt;
use std::path::PathBuf;
use tracing::{Event, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::format::FmtSpan,
    fmt::{format::Writer, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Targets used across the workspace, each gets the configured level
pub const LOG_TARGETS: &[&str] = &[
    "confab_core",
    "confab_llm",
    "service::turn",
    "service::state",
    "service::tool",
    "memory",
    "llm::request",
];

/// Custom formatter that colors different event types
struct ColoredFormatter;

fn target_colors(target: &str) -> (&'static str, &'static str) {
    match target {
        "service::turn" => ("\x1b[38;5;213m", ""),  // pink
        "service::state" => ("\x1b[38;5;82m", ""),  // lime
        "service::tool" => ("\x1b[38;5;51m", ""),   // cyan
        "memory" => ("\x1b[38;5;226m", ""),         // yellow
        "llm::request" => ("\x1b[38;5;208m", ""),   // orange
        _ => ("\x1b[2m", "\x1b[2m"),
    }
}

impl<S, N> FormatEvent<S, N> for ColoredFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let (target_color, message_color) = target_colors(metadata.target());

        let level_color = match *metadata.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            tracing::Level::DEBUG => "\x1b[34m",
            tracing::Level::TRACE => "\x1b[35m",
        };

        // [timestamp] [level] [target] message
        write!(writer, "{} ", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;
        write!(writer, "{}{:5}\x1b[0m ", level_color, metadata.level())?;
        write!(writer, "{}[{}]\x1b[0m ", target_color, metadata.target())?;
        write!(writer, "{}", message_color)?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer, "\x1b[0m")
    }
}

/// Logging configuration, off unless asked for
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "debug", "info", "warn", "error")
    pub level: String,
    /// Optional file path for log output. If None, logs to stderr
    pub file_path: Option<PathBuf>,
    /// Whether to include spans in logs
    pub include_spans: bool,
    /// JSON format instead of human-readable
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "off".to_string(),
            file_path: None,
            include_spans: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| get(key).map(|v| v == "true" || v == "1").unwrap_or(false);
        Self {
            level: get("CONFAB_LOG_LEVEL").unwrap_or_else(|| "off".to_string()),
            file_path: get("CONFAB_LOG_FILE").map(PathBuf::from),
            include_spans: flag("CONFAB_LOG_SPANS"),
            json_format: flag("CONFAB_LOG_JSON"),
        }
    }

    pub fn level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    pub fn file_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.include_spans = enable;
        self
    }

    pub fn json_format(mut self, enable: bool) -> Self {
        self.json_format = enable;
        self
    }

    /// Everything else stays at warn, our targets follow `level`
    fn filter(&self) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
        let mut filter = EnvFilter::from_default_env().add_directive("warn".parse()?);
        for target in LOG_TARGETS {
            filter = filter.add_directive(format!("{}={}", target, self.level).parse()?);
        }
        Ok(filter)
    }

    /// Initialize the global tracing subscriber (safe for multiple calls)
    pub fn init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = self.filter()?;
        let span_events = if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        match self.file_path {
            Some(path) => {
                let file_appender = RollingFileAppender::new(
                    Rotation::DAILY,
                    path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("confab.log")),
                );

                if self.json_format {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(tracing_subscriber::fmt::layer().json().with_writer(file_appender).with_span_events(span_events))
                        .try_init()
                        .map_err(|_| "Failed to initialize subscriber (already set)")?;
                } else {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            tracing_subscriber::fmt::layer()
                                .with_writer(file_appender)
                                .with_span_events(span_events)
                                .with_ansi(false),
                        )
                        .try_init()
                        .map_err(|_| "Failed to initialize subscriber (already set)")?;
                }
            }
            None => {
                // stdout belongs to the conversation, logs go to stderr
                if self.json_format {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr).with_span_events(span_events))
                        .try_init()
                        .map_err(|_| "Failed to initialize subscriber (already set)")?;
                } else {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            tracing_subscriber::fmt::layer()
                                .event_format(ColoredFormatter)
                                .with_writer(std::io::stderr)
                                .with_ansi(true),
                        )
                        .try_init()
                        .map_err(|_| "Failed to initialize subscriber (already set)")?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_vars() {
        let vars = HashMap::from([
            ("CONFAB_LOG_LEVEL", "debug"),
            ("CONFAB_LOG_FILE", "/tmp/confab/confab.log"),
            ("CONFAB_LOG_JSON", "true"),
        ]);
        let config = LoggingConfig::from_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.level, "debug");
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/confab/confab.log")));
        assert!(config.json_format);
        assert!(!config.include_spans);
    }

    #[test]
    fn test_defaults_to_off() {
        let config = LoggingConfig::from_vars(|_| None);
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn test_filter_accepts_every_target() {
        assert!(LoggingConfig::default().level("trace").filter().is_ok());
        assert!(LoggingConfig::default().level("not a level!").filter().is_err());
    }
}
