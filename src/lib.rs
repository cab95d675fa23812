//! chainserve - a small HTTP toolkit built around handler chains.
//!
//! A request is handled by an ordered [`HandlerChain`]. Handlers share one
//! [`Context`] and either pass, write output directly, or return a
//! declarative [`Response`] that the chain writes for them.
//!
//! # Features
//!
//! - **Response variants**: JSON envelope, JSONP, redirects, files with
//!   range and conditional request support, simple content
//! - **Hijack mode**: error statuses written by lower layers are rewritten
//!   into the JSON envelope
//! - **Error aggregation**: [`MultiError`] collects API errors from many
//!   input shapes
//! - **Transport**: HTTP/1.1 and HTTP/2 via hyper with graceful shutdown
//! - **Logging**: structured JSON logs through tracing
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chainserve::{HandlerChain, JsonResponse, Params, Server, ServerConfig};
//!
//! let chain = Arc::new(HandlerChain::new().add_fn(|ctx| {
//!     let name = ctx.param("name").unwrap_or("world").to_string();
//!     Some(JsonResponse::new(format!("hello {}", name)).into())
//! }));
//!
//! let server = Server::new(ServerConfig::default(), move |_: &http::Method, path: &str| {
//!     let name = path.strip_prefix("/hello/")?;
//!     Some((Arc::clone(&chain), Params::new().with("name", name)))
//! });
//! server.run().await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), "unknown" outside a checkout
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod core;
pub mod errors;
pub mod handler;
pub mod logging;
pub mod response;
pub mod server;

// Re-exports for convenience
pub use crate::core::{Context, Error, Params, Request, Result};
pub use config::Config;
pub use errors::{ApiError, ErrorInput, MultiError};
pub use handler::{Handler, HandlerChain};
pub use response::{JsonResponse, Response, WriteToCtx, BREAK};
pub use server::{Resolve, Server, ServerConfig};
