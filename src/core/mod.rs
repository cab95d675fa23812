//! Core types for request handling.
//!
//! - [`Request`] - inbound request with a one-shot body
//! - [`Params`] - router path parameters
//! - [`ResponseSink`] - raw response stream, [`BufferedSink`] for in-memory use
//! - [`Context`] - per-request state handed to every handler
//! - [`Error`] - core error type
//!
//! # Example
//!
//! ```rust,ignore
//! use chainserve::core::{BufferedSink, Context, Params, Request};
//!
//! let mut sink = BufferedSink::new();
//! let mut ctx = Context::new(req, Params::new(), &mut sink);
//! ctx.text(200, "", format_args!("hello {}", "world"))?;
//! ```

mod context;
mod error;
mod params;
mod request;
mod serve;
mod sink;

pub use context::Context;
pub use error::{Error, Result};
pub use params::Params;
pub use request::{Body, Request};
pub use serve::{parse_range, serve_content, ByteRange, RangeParseResult};
pub use sink::{body_allowed, BufferedSink, ResponseSink};

/// Content type values written by the toolkit.
pub mod mime {
    pub const JSON: &str = "application/json; charset=utf-8";
    pub const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const BINARY: &str = "application/octet-stream";
}
