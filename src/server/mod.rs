//! HTTP transport for handler chains.
//!
//! [`Server`] accepts TCP connections, serves HTTP/1.1 and HTTP/2 through
//! hyper, and hands each request to the [`HandlerChain`](crate::HandlerChain)
//! returned by its [`Resolve`] implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chainserve::{HandlerChain, Params, Server, ServerConfig};
//! use chainserve::response::common;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let ping = Arc::new(HandlerChain::new().add_fn(|_| Some(common::ok())));
//!     let server = Server::new(ServerConfig::default(), move |_: &http::Method, path: &str| {
//!         (path == "/ping").then(|| (Arc::clone(&ping), Params::new()))
//!     });
//!
//!     server.run().await
//! }
//! ```
//!
//! # Graceful Shutdown
//!
//! [`Server::trigger_shutdown`] stops the accept loop and asks every open
//! connection to finish its in-flight request. [`Server::wait_for_drain`]
//! then waits for the connection count to reach zero.

mod connection;
mod resolve;
mod stream;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub use crate::config::ServerConfig;
pub use connection::{render, HttpResponse, ResponseBody};
pub use resolve::Resolve;
pub use stream::{StreamingBody, STREAM_CHANNEL_CAPACITY};

use connection::ConnectionContext;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// HTTP server driving handler chains.
pub struct Server {
    config: ServerConfig,
    resolver: Arc<dyn Resolve>,
    active_connections: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl Server {
    pub fn new(config: ServerConfig, resolver: impl Resolve) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            resolver: Arc::new(resolver),
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of open connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Creates the listening socket.
    fn create_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
        let domain = if addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;

        Ok(socket.into())
    }

    /// Bind the configured listen address.
    pub fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::from_std(Self::create_listener(self.config.listen_addr)?)
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), BoxError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown is triggered.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), BoxError> {
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on http://{} (workers: {})",
            local_addr,
            self.config.worker_count()
        );

        let ctx = Arc::new(ConnectionContext::new(
            &self.config,
            Arc::clone(&self.resolver),
            Arc::clone(&self.active_connections),
        ));
        let keepalive = self.config.keepalive_period.map(|period| {
            TcpKeepalive::new()
                .with_time(period)
                .with_interval(period)
        });

        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);
                    if let Some(keepalive) = &keepalive {
                        let sock_ref = SockRef::from(&stream);
                        let _ = sock_ref.set_tcp_keepalive(keepalive);
                    }

                    let ctx = Arc::clone(&ctx);
                    let conn_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        ctx.handle_connection(stream, remote_addr, conn_shutdown).await;
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("Received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Trigger graceful shutdown.
    /// Stops the accept loop and drains open connections.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.config.drain_timeout
    }

    /// Wait for all active connections to drain.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(100);

        loop {
            let active = self.active_connections.load(Ordering::Relaxed);
            if active == 0 {
                return true;
            }

            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }

            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }
}
