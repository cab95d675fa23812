//! Logging configuration.

use std::str::FromStr;

use super::parse::env_or;
use super::ConfigError;

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable text.
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(format!("expected json or text, got '{}'", other)),
        }
    }
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Service name for structured logging.
    pub service_name: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "chainserve=info".to_string(),
            service_name: "chainserve".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: chainserve=debug,hyper=warn
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = env_or("LOG_FORMAT", "json")
            .parse()
            .map_err(|message| ConfigError::Invalid {
                key: "LOG_FORMAT",
                message,
            })?;

        Ok(Self {
            filter: Self::resolve_log_filter()?,
            service_name: env_or("SERVICE_NAME", "chainserve"),
            format,
        })
    }

    /// Filter directive from `LOG_LEVEL`, then `RUST_LOG`, then the default.
    fn resolve_log_filter() -> Result<String, ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        let level = env_or("LOG_LEVEL", "").to_ascii_lowercase();
        if LEVELS.contains(&level.as_str()) {
            return Ok(format!("chainserve={}", level));
        }
        if !level.is_empty() {
            return Err(ConfigError::Invalid {
                key: "LOG_LEVEL",
                message: format!("expected one of {}, got '{}'", LEVELS.join(", "), level),
            });
        }

        Ok(env_or("RUST_LOG", "chainserve=info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::ENV_LOCK;
    use std::env;

    #[test]
    fn test_log_level_priority() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::remove_var("LOG_LEVEL");
        env::remove_var("RUST_LOG");

        assert_eq!(LoggingConfig::resolve_log_filter().unwrap(), "chainserve=info");

        env::set_var("RUST_LOG", "chainserve=warn,hyper=debug");
        assert_eq!(
            LoggingConfig::resolve_log_filter().unwrap(),
            "chainserve=warn,hyper=debug"
        );

        env::set_var("LOG_LEVEL", "DEBUG");
        assert_eq!(LoggingConfig::resolve_log_filter().unwrap(), "chainserve=debug");

        env::set_var("LOG_LEVEL", "loud");
        let err = LoggingConfig::resolve_log_filter().unwrap_err();
        assert_eq!(err.key(), "LOG_LEVEL");

        env::remove_var("LOG_LEVEL");
        env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_log_format() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        env::remove_var("LOG_FORMAT");
        assert_eq!(LoggingConfig::from_env().unwrap().format, LogFormat::Json);

        env::set_var("LOG_FORMAT", "Text");
        assert_eq!(LoggingConfig::from_env().unwrap().format, LogFormat::Text);

        env::set_var("LOG_FORMAT", "xml");
        assert!(matches!(
            LoggingConfig::from_env(),
            Err(ConfigError::Invalid { .. })
        ));

        env::remove_var("LOG_FORMAT");
    }
}
