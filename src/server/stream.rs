//! Channel-backed response sink.
//!
//! The handler chain runs on a blocking thread and writes into a
//! [`ChannelSink`]. The status and headers travel through a oneshot channel
//! when the response is committed; body chunks follow through a bounded
//! mpsc channel that backs a [`StreamBody`], so a chain writing a large
//! reader blocks on the client instead of filling memory.

use std::io;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::StreamBody;
use hyper::body::Frame;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::core::{body_allowed, ResponseSink};

/// Chunks buffered between the chain and hyper before writes block.
pub const STREAM_CHANNEL_CAPACITY: usize = 16;

/// One body frame, or the error that aborts the response.
pub type Chunk = io::Result<Frame<Bytes>>;

/// Body fed by a [`ChannelSink`].
pub type StreamingBody = StreamBody<ReceiverStream<Chunk>>;

/// Committed status line and headers.
#[derive(Debug)]
pub struct Head {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Create a sink with the receiving ends for its head and body.
pub fn channel() -> (ChannelSink, oneshot::Receiver<Head>, StreamingBody) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

    let sink = ChannelSink {
        headers: HeaderMap::new(),
        status: None,
        head_tx: Some(head_tx),
        body_tx,
        finished: false,
    };
    (sink, head_rx, StreamBody::new(ReceiverStream::new(body_rx)))
}

/// Sink that streams to a hyper response.
///
/// Must only be used off the async runtime: body writes block while the
/// channel is full.
pub struct ChannelSink {
    headers: HeaderMap,
    status: Option<u16>,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: mpsc::Sender<Chunk>,
    finished: bool,
}

impl ChannelSink {
    /// Whether the head has been committed.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    fn commit(&mut self, code: u16) {
        self.status = Some(code);
        let head = Head {
            status: StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: self.headers.clone(),
        };
        if let Some(tx) = self.head_tx.take() {
            if tx.send(head).is_err() {
                debug!(code, "response head dropped, request already answered");
            }
        }
    }

    /// End the body with an error so the client sees a truncated response
    /// rather than a complete one.
    pub fn abort(&mut self, reason: &str) {
        self.finished = true;
        if self.is_committed() {
            let _ = self
                .body_tx
                .blocking_send(Err(io::Error::new(io::ErrorKind::Other, reason.to_string())));
        }
    }

    /// Finish a chain run normally.
    ///
    /// Returns the headers of a sink that never committed, which the caller
    /// answers with a plain response.
    pub fn finish(mut self) -> Option<HeaderMap> {
        self.finished = true;
        if self.is_committed() {
            None
        } else {
            Some(std::mem::take(&mut self.headers))
        }
    }
}

impl ResponseSink for ChannelSink {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, code: u16) {
        if let Some(prev) = self.status {
            debug!(prev, code, "superfluous write_header call ignored");
            return;
        }
        self.commit(code);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.commit(200);
        }
        let status = self.status.unwrap_or(200);
        if !body_allowed(status) || buf.is_empty() {
            return Ok(buf.len());
        }

        self.body_tx
            .blocking_send(Ok(Frame::data(Bytes::copy_from_slice(buf))))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response stream closed"))?;
        Ok(buf.len())
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        // Unwinding out of the chain leaves the body incomplete
        if !self.finished && self.is_committed() {
            let _ = self
                .body_tx
                .blocking_send(Err(io::Error::new(io::ErrorKind::Other, "response aborted")));
        }
    }
}
