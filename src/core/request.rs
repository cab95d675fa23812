//! HTTP request abstraction handed to the handler chain.

use std::fmt;
use std::io::{Cursor, Read};

use bytes::Bytes;
use http::header;
use http::{HeaderMap, Method, Uri};
use percent_encoding::percent_decode_str;

/// Readable request body. Dropping it closes the body.
pub type Body = Box<dyn Read + Send>;

/// HTTP request as seen by handlers.
///
/// The body is a one-shot reader; once closed (or consumed by
/// [`Request::close_body`]) it reads as empty.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Body>,
}

impl Request {
    /// Create a new request with an in-memory body.
    #[inline]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self::with_body(method, uri, headers, Box::new(Cursor::new(body)))
    }

    /// Create a new request with an arbitrary body reader.
    #[inline]
    pub fn with_body(method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            uri,
            headers,
            body: Some(body),
        }
    }

    /// Get the HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request path (escaped form).
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the raw query string.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Get the first decoded value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(k, _)| decode_component(k) == key)
            .map(|(_, v)| decode_component(v))
    }

    /// Full request URI.
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of header `name` (case-insensitive), if it is valid text.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Content-Type` of the request body.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Get a mutable handle to the body, if it has not been closed.
    #[inline]
    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.body.as_mut()
    }

    /// Close the body. Subsequent reads return EOF.
    #[inline]
    pub fn close_body(&mut self) {
        self.body = None;
    }

    /// Whether the body has been closed.
    #[inline]
    pub fn is_body_closed(&self) -> bool {
        self.body.is_none()
    }
}

impl Read for Request {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.body.as_mut() {
            Some(body) => body.read(buf),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("body_closed", &self.body.is_none())
            .finish()
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: Into<Bytes>,
{
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        let body: Bytes = body.into();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: Some(Box::new(Cursor::new(body))),
        }
    }
}

/// Decode one `application/x-www-form-urlencoded` component.
fn decode_component(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}
