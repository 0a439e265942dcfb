//! Logging configuration.
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG`, falling
//! back to a default directive when the variable is unset.

use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ConfigurationError, ReportsError};

/// Directive used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
    /// Single-line output.
    Compact,
}

impl FromStr for LogFormat {
    type Err = ReportsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigurationError::InvalidValue {
                field: "log_format".to_string(),
                message: format!("expected pretty, json or compact, got {other:?}"),
            }
            .into()),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive applied when `RUST_LOG` is unset.
    pub default_directive: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_directive: DEFAULT_DIRECTIVE.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Build the filter: `RUST_LOG` if set and valid, otherwise the default directive.
    pub fn filter(&self) -> Result<EnvFilter, ReportsError> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_directive))
            .map_err(|e| {
                ConfigurationError::InvalidValue {
                    field: "log_directive".to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Install the global subscriber.
    ///
    /// # Errors
    ///
    /// Fails if the directive is invalid or a global subscriber is already set.
    pub fn init(self) -> Result<(), ReportsError> {
        let filter = self.filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match self.format {
            LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
            LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        };

        installed.map_err(|e| {
            ConfigurationError::InvalidValue {
                field: "logging".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Install a pretty subscriber with `default_directive` as the fallback filter.
pub fn init_logging(default_directive: &str) -> Result<(), ReportsError> {
    LoggingConfig::new()
        .with_default_directive(default_directive)
        .init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" compact ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = LoggingConfig::new()
            .with_default_directive("overdrive_reports=debug")
            .with_format(LogFormat::Json);
        assert_eq!(config.default_directive, "overdrive_reports=debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(LoggingConfig::default().default_directive, DEFAULT_DIRECTIVE);
    }
}
