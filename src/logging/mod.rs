//! Standardized logging configuration for dashboard hosts.
//!
//! Provides a consistent `tracing` setup for every process embedding the
//! order core.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard tracing filter (e.g., `info`, `orders_common=debug`)
//! - `LOG_FORMAT`: output format - `pretty` (default) or `compact`
//! - `LOG_TIMESTAMPS`: timestamp format - `local` (default), `utc`, or `none`

use std::env;

use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format (default for terminals)
    #[default]
    Pretty,
    /// Compact single-line format for production
    Compact,
}

impl LogFormat {
    /// Parse format from string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Timestamp format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Local time with timezone (default)
    #[default]
    Local,
    /// UTC time (ISO 8601)
    Utc,
    /// No timestamps
    None,
}

impl TimestampFormat {
    /// Parse format from string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "utc" => TimestampFormat::Utc,
            "none" | "off" => TimestampFormat::None,
            _ => TimestampFormat::Local,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format
    pub format: LogFormat,
    /// Timestamp format
    pub timestamps: TimestampFormat,
    /// Default log level filter when `RUST_LOG` is not set
    pub default_level: String,
    /// Include target (module path)
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            timestamps: TimestampFormat::Local,
            default_level: "info".to_string(),
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            timestamps: env::var("LOG_TIMESTAMPS")
                .map(|s| TimestampFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            include_target: true,
        }
    }

    /// Set the default log level
    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Initialize logging with the given configuration
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let compact = config.format == LogFormat::Compact;

    let layer = fmt::layer()
        .with_target(config.include_target)
        .with_level(true);

    match config.timestamps {
        TimestampFormat::Local => {
            let layer =
                layer.with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f %z".to_string()));
            if compact {
                registry.with(layer.compact()).try_init()?;
            } else {
                registry.with(layer).try_init()?;
            }
        }
        TimestampFormat::Utc => {
            let layer = layer.with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()));
            if compact {
                registry.with(layer.compact()).try_init()?;
            } else {
                registry.with(layer).try_init()?;
            }
        }
        TimestampFormat::None => {
            let layer = layer.without_time();
            if compact {
                registry.with(layer.compact()).try_init()?;
            } else {
                registry.with(layer).try_init()?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("COMPACT"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_timestamp_format_parse() {
        assert_eq!(TimestampFormat::parse("utc"), TimestampFormat::Utc);
        assert_eq!(TimestampFormat::parse("off"), TimestampFormat::None);
        assert_eq!(TimestampFormat::parse("local"), TimestampFormat::Local);
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.timestamps, TimestampFormat::Local);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::default().with_default_level("debug");
        assert_eq!(config.default_level, "debug");
    }
}
