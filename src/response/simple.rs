use std::fmt;
use std::io::{self, Read, Write};

use bytes::Bytes;

use super::{Response, WriteToCtx};
use crate::core::{Context, Result};

/// Body of a [`SimpleResponse`].
pub enum Payload {
    Empty,
    Bytes(Bytes),
    Text(String),
    Reader(Box<dyn Read + Send>),
    Display(Box<dyn fmt::Display + Send>),
}

impl Payload {
    /// Stream from a reader.
    pub fn reader(r: impl Read + Send + 'static) -> Self {
        Payload::Reader(Box::new(r))
    }

    /// Render any displayable value.
    pub fn display(v: impl fmt::Display + Send + 'static) -> Self {
        Payload::Display(Box::new(v))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Payload::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Payload::Reader(_) => f.write_str("Reader(..)"),
            Payload::Display(d) => f.debug_tuple("Display").field(&d.to_string()).finish(),
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<&'static str> for Payload {
    fn from(s: &'static str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

/// Content with an optional status and content type.
#[derive(Debug)]
pub struct SimpleResponse {
    /// Written when positive.
    pub code: u16,
    /// Set when non-empty.
    pub content_type: String,
    pub payload: Payload,
}

/// A response with `code`, `content_type` and `payload`.
pub fn simple(code: u16, content_type: impl Into<String>, payload: impl Into<Payload>) -> Response {
    Response::Simple(SimpleResponse {
        code,
        content_type: content_type.into(),
        payload: payload.into(),
    })
}

/// Shorthand for `simple(200, content_type, payload)`.
pub fn plain(content_type: impl Into<String>, payload: impl Into<Payload>) -> Response {
    simple(200, content_type, payload)
}

impl WriteToCtx for SimpleResponse {
    fn write_to_ctx(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.set_content_type(&self.content_type);

        if self.code > 0 {
            ctx.write_header(self.code);
        }

        match &mut self.payload {
            Payload::Empty => {}
            Payload::Bytes(b) => ctx.write_all(b)?,
            Payload::Text(s) => ctx.write_all(s.as_bytes())?,
            Payload::Reader(r) => {
                io::copy(r, ctx)?;
            }
            Payload::Display(d) => write!(ctx, "{}", d)?,
        }
        Ok(())
    }
}
