//! File content serving with conditional GET and byte ranges.
//!
//! Failures are reported the classic way: a status header followed by a
//! short plain-text body. [`Context::file`](super::Context::file) intercepts
//! that pair and rewrites it as a structured error.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use http::header::{self, HeaderValue};
use http::Method;
use uuid::Uuid;

use super::context::Context;
use super::error::Result;
use super::mime;

/// One satisfiable byte range, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte position.
    pub start: u64,
    /// Last byte position (inclusive).
    pub end: u64,
}

impl ByteRange {
    #[inline]
    fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Range header parse result.
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// No header, or no usable range in it: serve the full content.
    None,
    /// Ranges that overlap the content, in request order.
    Satisfiable(Vec<ByteRange>),
    /// Well-formed, but no range overlaps the content.
    NotSatisfiable,
    /// Malformed header.
    Invalid,
}

/// Parse a `Range` header against a content size.
///
/// Each comma-separated range is `start-end`, `start-` or `-suffix`.
/// Ranges starting past the end are skipped; the header is unsatisfiable
/// only when none is left. Range sets larger than the content itself are
/// ignored.
pub fn parse_range(range_header: Option<&str>, size: u64) -> RangeParseResult {
    let Some(header) = range_header.map(str::trim).filter(|h| !h.is_empty()) else {
        return RangeParseResult::None;
    };
    let Some(spec) = header.strip_prefix("bytes=") else {
        return RangeParseResult::Invalid;
    };

    let mut ranges = Vec::new();
    let mut no_overlap = false;

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((start_str, end_str)) = part.split_once('-') else {
            return RangeParseResult::Invalid;
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        if start_str.is_empty() {
            let Ok(suffix) = end_str.parse::<u64>() else {
                return RangeParseResult::Invalid;
            };
            if suffix == 0 || size == 0 {
                no_overlap = true;
                continue;
            }
            ranges.push(ByteRange {
                start: size.saturating_sub(suffix),
                end: size - 1,
            });
            continue;
        }

        let Ok(start) = start_str.parse::<u64>() else {
            return RangeParseResult::Invalid;
        };
        if start >= size {
            no_overlap = true;
            continue;
        }

        let last = size - 1;
        let end = if end_str.is_empty() {
            last
        } else {
            match end_str.parse::<u64>() {
                Ok(e) if e >= start => e.min(last),
                _ => return RangeParseResult::Invalid,
            }
        };
        ranges.push(ByteRange { start, end });
    }

    if ranges.is_empty() {
        return if no_overlap {
            RangeParseResult::NotSatisfiable
        } else {
            RangeParseResult::None
        };
    }
    if ranges.iter().map(ByteRange::len).sum::<u64>() > size {
        return RangeParseResult::None;
    }
    RangeParseResult::Satisfiable(ranges)
}

/// `multipart/byteranges` body for several ranges.
struct Multipart {
    boundary: String,
    parts: Vec<(ByteRange, String)>,
}

impl Multipart {
    fn new(ranges: Vec<ByteRange>, content_type: &str, size: u64) -> Self {
        let boundary = Uuid::new_v4().simple().to_string();
        let parts = ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let mut head = String::new();
                if i > 0 {
                    head.push_str("\r\n");
                }
                head.push_str(&format!("--{}\r\n", boundary));
                head.push_str(&format!("Content-Range: {}\r\n", range.content_range(size)));
                if !content_type.is_empty() {
                    head.push_str(&format!("Content-Type: {}\r\n", content_type));
                }
                head.push_str("\r\n");
                (range, head)
            })
            .collect();
        Self { boundary, parts }
    }

    fn content_type(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    fn trailer(&self) -> String {
        format!("\r\n--{}--\r\n", self.boundary)
    }

    /// Exact body length.
    fn len(&self) -> u64 {
        let parts: u64 = self
            .parts
            .iter()
            .map(|(range, head)| head.len() as u64 + range.len())
            .sum();
        parts + self.trailer().len() as u64
    }

    fn write_to<R: Read + Seek>(&self, content: &mut R, out: &mut impl Write) -> io::Result<()> {
        for (range, head) in &self.parts {
            out.write_all(head.as_bytes())?;
            content.seek(SeekFrom::Start(range.start))?;
            io::copy(&mut content.by_ref().take(range.len()), out)?;
        }
        out.write_all(self.trailer().as_bytes())
    }
}

/// Outcome of a conditional header check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cond {
    None,
    True,
    False,
}

/// Serve `content` to `ctx`, honoring preconditions and byte ranges.
///
/// `name` is only used to guess the content type when none is set yet.
pub fn serve_content<R: Read + Seek>(
    ctx: &mut Context<'_>,
    name: &str,
    modified: SystemTime,
    mut content: R,
) -> Result<()> {
    let modified_secs = unix_secs(modified);

    if let Some(secs) = modified_secs {
        if !ctx.headers().contains_key(header::LAST_MODIFIED) {
            let value = httpdate::fmt_http_date(UNIX_EPOCH + std::time::Duration::from_secs(secs));
            if let Ok(v) = HeaderValue::try_from(value) {
                ctx.headers_mut().insert(header::LAST_MODIFIED, v);
            }
        }
    }

    let (done, range_header) = check_preconditions(ctx, modified_secs);
    if done {
        return Ok(());
    }

    if !ctx.headers().contains_key(header::CONTENT_TYPE) {
        let content_type = guess_content_type(name);
        ctx.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }

    let size = content.seek(SeekFrom::End(0))?;
    content.seek(SeekFrom::Start(0))?;

    let mut code = 200;
    let mut send_size = size;
    let mut multipart = None;

    match parse_range(range_header.as_deref(), size) {
        RangeParseResult::Satisfiable(mut ranges) if ranges.len() == 1 => {
            let range = ranges.remove(0);
            content.seek(SeekFrom::Start(range.start))?;
            send_size = range.len();
            code = 206;
            if let Ok(v) = HeaderValue::try_from(range.content_range(size)) {
                ctx.headers_mut().insert(header::CONTENT_RANGE, v);
            }
        }
        RangeParseResult::Satisfiable(ranges) => {
            let content_type = ctx
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let parts = Multipart::new(ranges, &content_type, size);
            send_size = parts.len();
            code = 206;
            if let Ok(v) = HeaderValue::try_from(parts.content_type()) {
                ctx.headers_mut().insert(header::CONTENT_TYPE, v);
            }
            multipart = Some(parts);
        }
        RangeParseResult::NotSatisfiable => {
            if let Ok(v) = HeaderValue::try_from(format!("bytes */{}", size)) {
                ctx.headers_mut().insert(header::CONTENT_RANGE, v);
            }
            return write_error(ctx, 416, "invalid range: failed to overlap");
        }
        RangeParseResult::Invalid => return write_error(ctx, 416, "invalid range"),
        RangeParseResult::None => {}
    }

    let headers = ctx.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if !headers.contains_key(header::CONTENT_ENCODING) {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(send_size));
    }

    ctx.write_header(code);

    if ctx.req.method() == Method::HEAD {
        return Ok(());
    }
    match multipart {
        Some(parts) => parts.write_to(&mut content, ctx)?,
        None => {
            io::copy(&mut content.take(send_size), ctx)?;
        }
    }
    Ok(())
}

/// Evaluate request preconditions.
///
/// Returns whether the response is already complete (304 or 412 written),
/// and the `Range` header to honor, if any.
fn check_preconditions(ctx: &mut Context<'_>, modified: Option<u64>) -> (bool, Option<String>) {
    let mut ch = check_if_match(ctx);
    if ch == Cond::None {
        ch = check_if_unmodified_since(ctx, modified);
    }
    if ch == Cond::False {
        ctx.write_header(412);
        return (true, None);
    }

    let is_get_or_head = matches!(*ctx.req.method(), Method::GET | Method::HEAD);
    match check_if_none_match(ctx) {
        Cond::False => {
            if is_get_or_head {
                write_not_modified(ctx);
            } else {
                ctx.write_header(412);
            }
            return (true, None);
        }
        Cond::None => {
            if check_if_modified_since(ctx, modified) == Cond::False {
                write_not_modified(ctx);
                return (true, None);
            }
        }
        Cond::True => {}
    }

    let mut range = ctx.req.header("range").map(str::to_string);
    if range.is_some() && check_if_range(ctx, modified) == Cond::False {
        range = None;
    }
    (false, range)
}

fn check_if_match(ctx: &Context<'_>) -> Cond {
    let Some(im) = ctx.req.header("if-match") else {
        return Cond::None;
    };
    let etag = response_etag(ctx);
    for candidate in im.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if candidate == "*" {
            return Cond::True;
        }
        if etag.is_some_and(|e| etag_strong_match(candidate, e)) {
            return Cond::True;
        }
    }
    Cond::False
}

fn check_if_unmodified_since(ctx: &Context<'_>, modified: Option<u64>) -> Cond {
    let (Some(ius), Some(modified)) = (ctx.req.header("if-unmodified-since"), modified) else {
        return Cond::None;
    };
    match parse_date(ius) {
        Some(t) if modified <= t => Cond::True,
        Some(_) => Cond::False,
        None => Cond::None,
    }
}

fn check_if_none_match(ctx: &Context<'_>) -> Cond {
    let Some(inm) = ctx.req.header("if-none-match") else {
        return Cond::None;
    };
    let etag = response_etag(ctx);
    for candidate in inm.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if candidate == "*" {
            return Cond::False;
        }
        if etag.is_some_and(|e| etag_weak_match(candidate, e)) {
            return Cond::False;
        }
    }
    Cond::True
}

fn check_if_modified_since(ctx: &Context<'_>, modified: Option<u64>) -> Cond {
    if !matches!(*ctx.req.method(), Method::GET | Method::HEAD) {
        return Cond::None;
    }
    let (Some(ims), Some(modified)) = (ctx.req.header("if-modified-since"), modified) else {
        return Cond::None;
    };
    match parse_date(ims) {
        Some(t) if modified <= t => Cond::False,
        Some(_) => Cond::True,
        None => Cond::None,
    }
}

fn check_if_range(ctx: &Context<'_>, modified: Option<u64>) -> Cond {
    if !matches!(*ctx.req.method(), Method::GET | Method::HEAD) {
        return Cond::None;
    }
    let Some(ir) = ctx.req.header("if-range") else {
        return Cond::None;
    };
    if ir.starts_with('"') || ir.starts_with("W/") {
        return match response_etag(ctx) {
            Some(e) if etag_strong_match(ir, e) => Cond::True,
            _ => Cond::False,
        };
    }
    match (parse_date(ir), modified) {
        (Some(t), Some(m)) if t == m => Cond::True,
        _ => Cond::False,
    }
}

fn write_not_modified(ctx: &mut Context<'_>) {
    let headers = ctx.headers_mut();
    headers.remove(header::CONTENT_TYPE);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONTENT_ENCODING);
    if headers.contains_key(header::ETAG) {
        headers.remove(header::LAST_MODIFIED);
    }
    ctx.write_header(304);
}

fn write_error(ctx: &mut Context<'_>, code: u16, message: &str) -> Result<()> {
    ctx.headers_mut().remove(header::CONTENT_LENGTH);
    ctx.set_content_type(mime::PLAIN);
    ctx.write_header(code);
    ctx.write_all(message.as_bytes())?;
    Ok(())
}

fn response_etag<'c>(ctx: &'c Context<'_>) -> Option<&'c str> {
    ctx.headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
}

fn etag_strong_match(a: &str, b: &str) -> bool {
    a == b && !a.starts_with("W/") && a.starts_with('"')
}

fn etag_weak_match(a: &str, b: &str) -> bool {
    a.trim_start_matches("W/") == b.trim_start_matches("W/")
}

fn parse_date(value: &str) -> Option<u64> {
    httpdate::parse_http_date(value).ok().and_then(unix_secs)
}

/// Whole seconds since the epoch; `None` for the epoch itself (unknown time).
fn unix_secs(t: SystemTime) -> Option<u64> {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) if d.as_secs() > 0 => Some(d.as_secs()),
        _ => None,
    }
}

fn guess_content_type(name: &str) -> HeaderValue {
    let Some(guess) = mime_guess::from_path(name).first() else {
        return HeaderValue::from_static(mime::BINARY);
    };
    let value = if guess.type_() == mime_guess::mime::TEXT && guess.get_param("charset").is_none() {
        format!("{}; charset=utf-8", guess.essence_str())
    } else {
        guess.to_string()
    };
    HeaderValue::try_from(value).unwrap_or_else(|_| HeaderValue::from_static(mime::BINARY))
}
