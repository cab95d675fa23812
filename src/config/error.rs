use std::fmt;

/// A bad environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The value does not parse as the expected type.
    Parse {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// The value parses but is not acceptable.
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    /// Name of the offending variable.
    pub fn key(&self) -> &'static str {
        match self {
            ConfigError::Parse { key, .. } | ConfigError::Invalid { key, .. } => key,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { key, value, reason } => {
                write!(f, "{}={:?}: {}", key, value, reason)
            }
            ConfigError::Invalid { key, message } => write!(f, "{}: {}", key, message),
        }
    }
}

impl std::error::Error for ConfigError {}
