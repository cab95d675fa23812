//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use chainserve::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Workers: {}", config.server.worker_count());
//! ```

mod error;
mod logging;
pub(crate) mod parse;
mod server;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use server::{ServerConfig, MIN_HEADER_BYTES};

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        let server = &self.server;
        info!("Configuration loaded:");
        info!("  Listen: {}", server.listen_addr);
        info!("  Document root: {:?}", server.document_root);
        info!("  Workers: {}", server.worker_count());
        info!("  Max header bytes: {}", server.max_header_bytes);
        info!("  Max body size: {}", server.max_body_size);

        match server.read_timeout {
            Some(t) => info!("  Read timeout: {}s", t.as_secs()),
            None => info!("  Read timeout: disabled"),
        }

        match server.write_timeout {
            Some(t) => info!("  Write timeout: {}s", t.as_secs()),
            None => info!("  Write timeout: disabled"),
        }

        if server.keepalive_period.is_none() {
            info!("  TCP keep-alive: disabled");
        }

        if !server.panic_recovery {
            info!("  Panic recovery: disabled");
        }

        if server.access_log {
            info!("  Access log: enabled");
        }
    }
}
