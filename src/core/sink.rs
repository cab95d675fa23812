//! Raw response stream underneath a [`Context`](super::Context).

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// The raw response stream a request writes to.
///
/// Semantics follow a classic response writer: headers are mutable until the
/// status line is committed by [`write_header`](ResponseSink::write_header),
/// the first body write commits an implicit `200` if no header was written,
/// and later header writes are ignored.
pub trait ResponseSink: Send {
    /// Response headers (mutable until the status is committed).
    fn headers(&self) -> &HeaderMap;

    /// Mutable response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status code.
    fn write_header(&mut self, code: u16);

    /// Append body bytes.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Whether a response with `status` may carry a body.
///
/// Informational, `204 No Content` and `304 Not Modified` responses are
/// header-only; sinks drop body writes made after committing one of them.
#[inline]
pub fn body_allowed(status: u16) -> bool {
    !matches!(status, 100..=199 | 204 | 304)
}

/// A sink that buffers the whole response in memory.
///
/// Used by the transport to turn one chain run into a hyper response, and by
/// tests to inspect exactly what reached the wire.
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: Option<u16>,
    headers: HeaderMap,
    body: BytesMut,
    header_writes: usize,
    body_writes: usize,
}

impl BufferedSink {
    /// Create an empty sink.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed status, if any.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Body bytes written so far.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get a header value by string name.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether a status or body byte has been committed.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    /// Number of explicit `write_header` calls that reached the sink.
    #[inline]
    pub fn header_writes(&self) -> usize {
        self.header_writes
    }

    /// Number of body writes that reached the sink.
    #[inline]
    pub fn body_writes(&self) -> usize {
        self.body_writes
    }

    /// Convert into a hyper-compatible response.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let status = self
            .status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(if self.status.is_some() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            });

        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl ResponseSink for BufferedSink {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, code: u16) {
        self.header_writes += 1;
        if let Some(prev) = self.status {
            tracing::debug!(prev, code, "superfluous write_header call ignored");
            return;
        }
        self.status = Some(code);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let status = *self.status.get_or_insert(200);
        if !body_allowed(status) {
            tracing::debug!(status, len = buf.len(), "body write dropped for header-only status");
            return Ok(buf.len());
        }
        self.body_writes += 1;
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}
