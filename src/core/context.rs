//! Per-request context: parameters, scratch storage and the response stream.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use http::header::{self, HeaderValue};
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{Error, Result};
use super::mime;
use super::params::Params;
use super::request::Request;
use super::serve::serve_content;
use super::sink::ResponseSink;
use crate::response::{JsonResponse, WriteToCtx};

/// Interception of the write path while a file is being served.
///
/// The file server reports failures (bad range, failed precondition) as a
/// status header followed by a plain-text body. While armed, an error header
/// is held back and the next body write is turned into a structured JSON
/// error carrying that status, so clients see one error shape everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hijack {
    Off,
    Armed,
    Suppressed(u16),
}

/// Request context passed to every handler in a chain.
///
/// A context lives exactly as long as one request: it borrows the response
/// stream and is dropped when the chain returns. It is not shared between
/// threads.
pub struct Context<'a> {
    /// Path parameters from the router.
    pub params: Params,

    /// The inbound request.
    pub req: Request,

    sink: &'a mut dyn ResponseSink,

    /// Handler-to-handler storage, allocated on first `set`.
    data: Option<HashMap<String, Box<dyn Any + Send + Sync>>>,

    status: u16,
    done: bool,
    hijack: Hijack,
}

impl<'a> Context<'a> {
    /// Create a context over a request and its response stream.
    pub fn new(req: Request, params: Params, sink: &'a mut dyn ResponseSink) -> Self {
        Self {
            params,
            req,
            sink,
            data: None,
            status: 0,
            done: false,
            hijack: Hijack::Off,
        }
    }

    /// Shorthand for `ctx.params.get(key)`.
    #[inline]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// First decoded value of a query parameter.
    #[inline]
    pub fn query(&self, key: &str) -> Option<String> {
        self.req.query_value(key)
    }

    /// Escaped request path.
    #[inline]
    pub fn path(&self) -> &str {
        self.req.path()
    }

    /// Request content type.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.req.content_type()
    }

    /// Set a custom value for handlers further down the chain.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.data
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), Box::new(value));
    }

    /// Get a custom value.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.data
            .as_ref()?
            .get(key)
            .and_then(|v| v.downcast_ref())
    }

    /// Get a mutable reference to a custom value.
    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.data
            .as_mut()?
            .get_mut(key)
            .and_then(|v| v.downcast_mut())
    }

    /// Remove a custom value.
    pub fn remove<T: 'static>(&mut self, key: &str) -> Option<T> {
        self.data
            .as_mut()?
            .remove(key)
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.sink.headers()
    }

    /// Mutable response headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    /// Set the response content type. Empty values are ignored.
    ///
    /// Always pairs the type with `X-Content-Type-Options: nosniff`.
    pub fn set_content_type(&mut self, content_type: &str) {
        if content_type.is_empty() {
            return;
        }
        let Ok(value) = HeaderValue::try_from(content_type) else {
            tracing::warn!(content_type, "invalid content type ignored");
            return;
        };
        let headers = self.sink.headers_mut();
        headers.insert(header::CONTENT_TYPE, value);
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
    }

    /// Last status passed to [`write_header`](Self::write_header), 0 if none.
    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether output has started. Returned responses are not written once
    /// this is true.
    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }

    /// Write the status header.
    pub fn write_header(&mut self, code: u16) {
        self.status = code;
        if self.hijack == Hijack::Armed && code >= 300 {
            tracing::debug!(code, "holding back file-serving error header");
            self.hijack = Hijack::Suppressed(code);
            return;
        }
        self.done = true;
        self.sink.write_header(code);
    }

    fn write_body(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Hijack::Suppressed(code) = self.hijack {
            self.hijack = Hijack::Off;
            self.sink.headers_mut().remove(header::CONTENT_LENGTH);

            let message = String::from_utf8_lossy(buf)
                .trim_end_matches('\n')
                .to_string();
            tracing::debug!(code, %message, "file-serving error rewritten as structured response");

            JsonResponse::error(code, [message]).write_to_ctx(self)?;
            return Ok(buf.len());
        }
        self.done = true;
        self.sink.write(buf)
    }

    /// Redirect with `307 Temporary Redirect`, or `308 Permanent Redirect`
    /// when `permanent` is set.
    pub fn redirect(&mut self, url: &str, permanent: bool) -> Result<()> {
        let code = if permanent { 308 } else { 307 };
        self.send_redirect(url, code)
    }

    /// Write a redirect to `url` with an explicit status code.
    ///
    /// Relative targets are resolved against the request path.
    pub fn send_redirect(&mut self, url: &str, code: u16) -> Result<()> {
        let location = resolve_location(self.req.path(), url);
        let value = HeaderValue::try_from(location.as_str()).map_err(|_| Error::InvalidUrl)?;

        let method = self.req.method().clone();
        let headers = self.sink.headers_mut();
        headers.insert(header::LOCATION, value);
        if (method == Method::GET || method == Method::HEAD)
            && !headers.contains_key(header::CONTENT_TYPE)
        {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime::HTML));
        }

        self.write_header(code);

        if method == Method::GET {
            let reason = http::StatusCode::from_u16(code)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Redirect");
            let body = format!("<a href=\"{}\">{}</a>.\n", html_escape(&location), reason);
            self.write_all(body.as_bytes())?;
        }
        Ok(())
    }

    /// Copy `reader` to the response with an optional content type.
    pub fn write_reader(&mut self, content_type: &str, mut reader: impl Read) -> io::Result<u64> {
        self.set_content_type(content_type);
        io::copy(&mut reader, self)
    }

    /// Serve a file with conditional GET and range support.
    ///
    /// Directories are rejected with [`Error::IsDirectory`]. Errors produced
    /// while serving (for example an unsatisfiable range) reach the client as
    /// a structured JSON error with the original status.
    pub fn file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let meta = file.metadata()?;
        if meta.is_dir() {
            return Err(Error::IsDirectory(path.to_path_buf()));
        }

        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        self.hijack = Hijack::Armed;
        let result = serve_content(self, &name, modified, file);

        // Header-only outcomes (304, 412) have no body to rewrite
        if let Hijack::Suppressed(code) = self.hijack {
            self.done = true;
            self.sink.write_header(code);
        }
        self.hijack = Hijack::Off;

        result
    }

    /// Close the request body.
    #[inline]
    pub fn close_body(&mut self) {
        self.req.close_body();
    }

    /// Decode the request body as JSON. The body is closed afterwards,
    /// whether decoding succeeded or not.
    pub fn bind_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let result = match self.req.body_mut() {
            Some(body) => serde_json::from_reader(body).map_err(Error::from),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "request body already closed",
            ))),
        };
        self.req.close_body();
        result
    }

    /// Write formatted text. Marks the context done.
    ///
    /// `content_type` defaults to `text/plain; charset=utf-8`.
    pub fn text(&mut self, code: u16, content_type: &str, args: fmt::Arguments<'_>) -> Result<usize> {
        self.done = true;

        let content_type = if content_type.is_empty() {
            mime::PLAIN
        } else {
            content_type
        };
        self.set_content_type(content_type);

        if code > 0 {
            self.write_header(code);
        }

        let text = fmt::format(args);
        self.write_all(text.as_bytes())?;
        Ok(text.len())
    }

    /// Write `value` as JSON. Marks the context done.
    ///
    /// Prefer returning a [`JsonResponse`] from the handler.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, indent: bool, value: &T) -> Result<()> {
        self.done = true;
        self.set_content_type(mime::JSON);

        let mut buf = encode_json(value, indent)?;
        buf.push(b'\n');

        if code > 0 {
            self.write_header(code);
        }
        self.write_all(&buf)?;
        Ok(())
    }

    /// Write `value` as a script callback invocation: `callback(<json>);`.
    pub fn jsonp<T: Serialize + ?Sized>(&mut self, code: u16, callback: &str, value: &T) -> Result<()> {
        self.done = true;
        self.set_content_type(mime::JAVASCRIPT);

        let json = encode_json(value, false)?;
        let mut buf = Vec::with_capacity(callback.len() + json.len() + 4);
        buf.extend_from_slice(callback.as_bytes());
        buf.push(b'(');
        buf.extend_from_slice(&json);
        buf.extend_from_slice(b");\n");

        if code > 0 {
            self.write_header(code);
        }
        self.write_all(&buf)?;
        Ok(())
    }
}

impl Write for Context<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for Context<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.req.read(buf)
    }
}

fn encode_json<T: Serialize + ?Sized>(value: &T, indent: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    if indent {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
    } else {
        serde_json::to_writer(&mut buf, value)?;
    }
    Ok(buf)
}

/// Resolve a redirect target against the current request path.
fn resolve_location(current: &str, url: &str) -> String {
    if url.is_empty() || url.starts_with('/') || has_scheme(url) {
        return url.to_string();
    }

    let current = if current.is_empty() { "/" } else { current };
    let dir = match current.rfind('/') {
        Some(i) => &current[..=i],
        None => "/",
    };

    let joined = format!("{}{}", dir, url);
    let (path, query) = match joined.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (joined.as_str(), None),
    };

    let mut cleaned = clean_path(path);
    if path.ends_with('/') && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    if let Some(q) = query {
        cleaned.push('?');
        cleaned.push_str(q);
    }
    cleaned
}

fn has_scheme(url: &str) -> bool {
    match url.split_once(':') {
        Some((scheme, _)) => {
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Collapse `.` and `..` segments of an absolute path.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
