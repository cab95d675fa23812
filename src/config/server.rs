//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_or, env_parse, env_size};
use super::ConfigError;

/// Smallest accepted header limit.
pub const MIN_HEADER_BYTES: usize = 8192;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Time allowed to receive request headers.
    pub read_timeout: Option<Duration>,
    /// Time allowed for the handler chain to produce a response.
    pub write_timeout: Option<Duration>,
    /// TCP keep-alive period, `None` disables socket keep-alive.
    pub keepalive_period: Option<Duration>,
    /// Maximum size of request headers.
    pub max_header_bytes: usize,
    /// Maximum size of a buffered request body.
    pub max_body_size: usize,
    /// Turn handler panics into JSON 500 responses.
    pub panic_recovery: bool,
    /// Emit one `access` log entry per request.
    pub access_log: bool,
    /// Blocking worker threads, 0 = number of CPUs.
    pub workers: usize,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
    /// Directory served by the demo binary.
    pub document_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(120)),
            keepalive_period: Some(Duration::from_secs(180)),
            max_header_bytes: 1 << 20,
            max_body_size: 10 << 20,
            panic_recovery: true,
            access_log: false,
            workers: 0,
            drain_timeout: Duration::from_secs(30),
            document_root: PathBuf::from("."),
        }
    }
}

impl ServerConfig {
    /// Default configuration listening on `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listen_addr: SocketAddr = env_parse("LISTEN_ADDR", defaults.listen_addr)?;

        let max_header_bytes = env_size("MAX_HEADER_BYTES", "1MiB")?;
        if max_header_bytes < MIN_HEADER_BYTES {
            return Err(ConfigError::Invalid {
                key: "MAX_HEADER_BYTES",
                message: format!("must be at least {} bytes", MIN_HEADER_BYTES),
            });
        }

        let drain_timeout =
            env_duration("DRAIN_TIMEOUT", "30s")?.unwrap_or(defaults.drain_timeout);

        Ok(Self {
            listen_addr,
            read_timeout: env_duration("READ_TIMEOUT", "30s")?,
            write_timeout: env_duration("WRITE_TIMEOUT", "2m")?,
            keepalive_period: env_duration("KEEPALIVE_PERIOD", "3m")?,
            max_header_bytes,
            max_body_size: env_size("MAX_BODY_SIZE", "10MiB")?,
            panic_recovery: env_bool("PANIC_RECOVERY", true)?,
            access_log: env_bool("ACCESS_LOG", false)?,
            workers: env_parse("WORKERS", 0usize)?,
            drain_timeout,
            document_root: PathBuf::from(env_or("DOCUMENT_ROOT", ".")),
        })
    }

    /// Effective number of blocking workers.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_keepalive(mut self, period: Option<Duration>) -> Self {
        self.keepalive_period = period;
        self
    }

    /// Header limit, raised to [`MIN_HEADER_BYTES`] if smaller.
    pub fn with_max_header_bytes(mut self, bytes: usize) -> Self {
        self.max_header_bytes = bytes.max(MIN_HEADER_BYTES);
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn with_panic_recovery(mut self, enabled: bool) -> Self {
        self.panic_recovery = enabled;
        self
    }

    pub fn with_access_log(mut self, enabled: bool) -> Self {
        self.access_log = enabled;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_document_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.document_root = root.into();
        self
    }
}
