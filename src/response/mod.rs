//! Declarative responses returned by handlers.
//!
//! A handler returns `Some(response)` to stop the chain; the chain then
//! writes it through [`WriteToCtx`] unless the handler already wrote output
//! itself. Each variant owns its finalization policy:
//!
//! - [`JsonResponse`] - `{code, success, data, errors}` envelope
//! - [`JsonpResponse`] - the same envelope wrapped in a script callback
//! - [`Redirect`] - `Location` redirect
//! - [`FileResponse`] - file from disk with range and conditional support
//! - [`SimpleResponse`] - arbitrary content with an optional status
//! - [`BREAK`] - stop the chain without writing anything

use std::fmt;

use crate::core::{Context, Result};

pub mod common;
mod file;
mod json;
mod jsonp;
mod redirect;
mod simple;

pub use file::{file, FileResponse};
pub use json::{read_json_response, JsonResponse};
pub use jsonp::JsonpResponse;
pub use redirect::{redirect, redirect_with_code, Redirect};
pub use simple::{plain, simple, Payload, SimpleResponse};

/// Stops the handler chain without writing anything to the connection.
pub const BREAK: Response = Response::Break;

/// A value that knows how to write itself to a request context.
pub trait WriteToCtx {
    fn write_to_ctx(&mut self, ctx: &mut Context<'_>) -> Result<()>;
}

/// The closed set of responses a handler can return.
pub enum Response {
    Json(JsonResponse),
    Jsonp(JsonpResponse),
    Redirect(Redirect),
    File(FileResponse),
    Simple(SimpleResponse),
    Break,
}

impl Response {
    /// Short variant name, used in logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Json(_) => "json",
            Response::Jsonp(_) => "jsonp",
            Response::Redirect(_) => "redirect",
            Response::File(_) => "file",
            Response::Simple(_) => "simple",
            Response::Break => "break",
        }
    }

    #[inline]
    pub fn is_break(&self) -> bool {
        matches!(self, Response::Break)
    }
}

impl WriteToCtx for Response {
    fn write_to_ctx(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        match self {
            Response::Json(r) => r.write_to_ctx(ctx),
            Response::Jsonp(r) => r.write_to_ctx(ctx),
            Response::Redirect(r) => r.write_to_ctx(ctx),
            Response::File(r) => r.write_to_ctx(ctx),
            Response::Simple(r) => r.write_to_ctx(ctx),
            Response::Break => Ok(()),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Json(r) => f.debug_tuple("Json").field(r).finish(),
            Response::Jsonp(r) => f.debug_tuple("Jsonp").field(r).finish(),
            Response::Redirect(r) => f.debug_tuple("Redirect").field(r).finish(),
            Response::File(r) => f.debug_tuple("File").field(r).finish(),
            Response::Simple(r) => f.debug_tuple("Simple").field(r).finish(),
            Response::Break => f.write_str("Break"),
        }
    }
}

impl From<JsonResponse> for Response {
    fn from(r: JsonResponse) -> Self {
        Response::Json(r)
    }
}

impl From<JsonpResponse> for Response {
    fn from(r: JsonpResponse) -> Self {
        Response::Jsonp(r)
    }
}

impl From<Redirect> for Response {
    fn from(r: Redirect) -> Self {
        Response::Redirect(r)
    }
}

impl From<FileResponse> for Response {
    fn from(r: FileResponse) -> Self {
        Response::File(r)
    }
}

impl From<SimpleResponse> for Response {
    fn from(r: SimpleResponse) -> Self {
        Response::Simple(r)
    }
}
