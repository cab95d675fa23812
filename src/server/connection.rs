//! Per-connection hyper service.
//!
//! Each request is resolved, its body buffered, and the handler chain run on
//! a blocking thread against a [`ChannelSink`](super::stream::ChannelSink).
//! The response is handed to hyper as soon as the chain commits its status,
//! and the body streams while the chain keeps writing.

use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::{BodyExt, Either, Full, LengthLimitError, Limited};
use hyper::body::Incoming as IncomingBody;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::resolve::Resolve;
use super::stream::{self, StreamingBody};
use crate::config::{ServerConfig, MIN_HEADER_BYTES};
use crate::core::{BufferedSink, Context, Params, Request};
use crate::errors::ErrorInput;
use crate::logging::ACCESS_TARGET;
use crate::response::{common, JsonResponse, Response, WriteToCtx};

/// Response body: buffered for transport-generated responses, streamed for
/// handler output.
pub type ResponseBody = Either<Full<Bytes>, StreamingBody>;

/// Hyper response type produced by the transport.
pub type HttpResponse = http::Response<ResponseBody>;

/// Check if an error is a common connection reset or timeout.
#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
        || err_str.contains("HeaderTimeout")
}

/// Shared state for every connection accepted by one server.
pub struct ConnectionContext {
    pub resolver: Arc<dyn Resolve>,
    pub active_connections: Arc<AtomicUsize>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub max_header_bytes: usize,
    pub max_body_size: usize,
    pub panic_recovery: bool,
    pub access_log_enabled: bool,
}

impl ConnectionContext {
    pub fn new(
        config: &ServerConfig,
        resolver: Arc<dyn Resolve>,
        active_connections: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            resolver,
            active_connections,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            max_header_bytes: config.max_header_bytes.max(MIN_HEADER_BYTES),
            max_body_size: config.max_body_size,
            panic_recovery: config.panic_recovery,
            access_log_enabled: config.access_log,
        }
    }

    /// Serve one TCP connection until it closes or shutdown completes it.
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let _guard = ConnectionGuard::new(Arc::clone(&self.active_connections));

        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_request(req, remote_addr).await }
        });

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_timeout)
            .max_buf_size(self.max_header_bytes)
            .keep_alive(true);
        builder
            .http2()
            .timer(TokioTimer::new())
            .max_concurrent_streams(250);

        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let mut draining = *shutdown_rx.borrow();
        if draining {
            conn.as_mut().graceful_shutdown();
        }

        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(err) = result {
                        let err_str = format!("{:?}", err);
                        if !is_connection_error(&err_str) {
                            debug!("Connection error: {:?}", err);
                        }
                    }
                    break;
                }
                changed = shutdown_rx.changed(), if !draining => {
                    draining = true;
                    if changed.is_ok() {
                        debug!(%remote_addr, "draining connection");
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        }
    }

    async fn handle_request(
        &self,
        req: http::Request<IncomingBody>,
        remote_addr: SocketAddr,
    ) -> Result<HttpResponse, Infallible> {
        let start = Instant::now();

        let access = self.access_log_enabled.then(|| {
            (
                req.method().clone(),
                req.uri().path().to_string(),
                req.headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string(),
            )
        });

        let response = self.process_request(req).await;

        if let Some((method, path, request_id)) = access {
            let bytes = response_bytes(&response);
            tracing::info!(
                target: ACCESS_TARGET,
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                bytes,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                request_id = %request_id,
                ip = %remote_addr.ip(),
                ""
            );
        }

        Ok(response)
    }

    async fn process_request(&self, req: http::Request<IncomingBody>) -> HttpResponse {
        let Some((chain, params)) = self.resolver.resolve(req.method(), req.uri().path()) else {
            return render(common::not_found());
        };

        let declared = req
            .headers()
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_size) {
            return render(JsonResponse::from_status(413));
        }

        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return render(JsonResponse::from_status(413));
            }
            Err(e) => {
                debug!("Failed to read request body: {}", e);
                return render(JsonResponse::error(400, [e.to_string()]));
            }
        };

        let request = Request::from(http::Request::from_parts(parts, body));
        let panic_recovery = self.panic_recovery;
        let (mut sink, head_rx, body) = stream::channel();

        let task = tokio::task::spawn_blocking(move || {
            let result = if panic_recovery {
                panic::catch_unwind(AssertUnwindSafe(|| chain.serve(request, params, &mut sink)))
            } else {
                Ok(chain.serve(request, params, &mut sink))
            };

            if sink.is_committed() {
                match &result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(error = %err, "handler error after response started"),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(panic = %message, "handler panicked after response started");
                        sink.abort("handler panicked");
                    }
                }
            }
            (sink.finish(), result)
        });

        // Resolves with the head once the chain commits, or with the chain's
        // outcome if it finishes without committing.
        let started = async move {
            match head_rx.await {
                Ok(head) => Ok(head),
                Err(_) => Err(task.await),
            }
        };

        let outcome = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, started).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "handler chain timed out");
                    return render(JsonResponse::from_status(504));
                }
            },
            None => started.await,
        };

        let joined = match outcome {
            Ok(head) => {
                let mut res = http::Response::new(Either::Right(body));
                *res.status_mut() = head.status;
                *res.headers_mut() = head.headers;
                return res;
            }
            Err(joined) => joined,
        };

        let (headers, result) = match joined {
            Ok(done) => done,
            Err(e) if e.is_panic() => {
                // Recovery is off: take the connection down with the handler
                panic::resume_unwind(e.into_panic());
            }
            Err(e) => {
                error!("Handler task failed: {}", e);
                return render(JsonResponse::from_status(500));
            }
        };

        match result {
            Ok(Ok(())) => {
                let mut res = http::Response::new(Either::Left(Full::new(Bytes::new())));
                *res.headers_mut() = headers.unwrap_or_default();
                res
            }
            Ok(Err(err)) => {
                let code = err.status_code();
                warn!(error = %err, status = code, "handler chain failed");
                render(JsonResponse::error(code, [ErrorInput::from(err)]))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "handler panicked");
                render(JsonResponse::error(500, [format!("panic: {}", message)]))
            }
        }
    }
}

/// Counts a connection as active for as long as its task holds it, including
/// when the task unwinds.
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        Self(active)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Write a response outside of any handler chain.
pub fn render(resp: impl Into<Response>) -> HttpResponse {
    let mut resp = resp.into();
    let mut sink = BufferedSink::new();
    {
        let req = Request::new(Method::GET, Uri::from_static("/"), HeaderMap::new(), Bytes::new());
        let mut ctx = Context::new(req, Params::new(), &mut sink);
        if let Err(e) = resp.write_to_ctx(&mut ctx) {
            error!("Failed to render {} response: {}", resp.kind(), e);
        }
    }

    if !sink.is_committed() {
        let mut fallback = http::Response::new(Either::Left(Full::new(Bytes::new())));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return fallback;
    }
    sink.into_response().map(Either::Left)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Body length for the access log: exact for buffered bodies, the declared
/// `Content-Length` for streamed ones.
fn response_bytes(res: &HttpResponse) -> u64 {
    use hyper::body::Body;
    res.body().size_hint().exact().unwrap_or_else(|| {
        res.headers()
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    })
}
