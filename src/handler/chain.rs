use std::sync::Arc;

use super::Handler;
use crate::core::{Context, Params, Request, ResponseSink, Result};
use crate::response::{Response, WriteToCtx};

/// An ordered list of handlers run against one request context.
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler.
    pub fn add<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append a closure handler.
    pub fn add_fn<F>(self, f: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Option<Response> + Send + Sync + 'static,
    {
        self.add(f)
    }

    /// Append a shared handler.
    pub fn add_arc(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain for one request against `sink`.
    pub fn serve(&self, req: Request, params: Params, sink: &mut dyn ResponseSink) -> Result<()> {
        let mut ctx = Context::new(req, params, sink);
        self.run(&mut ctx)
    }

    /// Run the chain against an existing context.
    ///
    /// Handlers run in order until one returns a response. That response is
    /// written only if the context has no output yet; its write error is
    /// returned as is.
    pub fn run(&self, ctx: &mut Context<'_>) -> Result<()> {
        for handler in &self.handlers {
            let Some(mut resp) = handler.handle(ctx) else {
                continue;
            };

            if resp.is_break() {
                tracing::debug!(handler = handler.name(), "handler chain stopped");
                return Ok(());
            }

            if ctx.done() {
                tracing::debug!(
                    handler = handler.name(),
                    kind = resp.kind(),
                    "response dropped, output already written"
                );
                return Ok(());
            }

            return resp.write_to_ctx(ctx);
        }
        Ok(())
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for HandlerChain {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BufferedSink, Error};
    use crate::response::{redirect, JsonResponse, BREAK};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> Request {
        Request::from(
            http::Request::builder()
                .uri("/items/3")
                .body(Bytes::new())
                .unwrap(),
        )
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&mut Context<'_>) -> Option<Response> + Send + Sync) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let handler = move |_: &mut Context<'_>| {
            c.fetch_add(1, Ordering::SeqCst);
            None
        };
        (calls, handler)
    }

    struct Named;

    impl Handler for Named {
        fn name(&self) -> &'static str {
            "named"
        }

        fn handle(&self, ctx: &mut Context<'_>) -> Option<Response> {
            let id = ctx.param("id").unwrap_or_default().to_string();
            Some(JsonResponse::new(id).into())
        }
    }

    #[test]
    fn test_empty_chain() {
        let chain = HandlerChain::new();
        assert!(chain.is_empty());

        let mut sink = BufferedSink::new();
        chain.serve(request(), Params::new(), &mut sink).unwrap();
        assert!(!sink.is_committed());
    }

    #[test]
    fn test_break_stops_without_writing() {
        let (calls, h2) = counter();
        let chain = HandlerChain::new().add_fn(|_| Some(BREAK)).add(h2);
        assert_eq!(chain.len(), 2);

        let mut sink = BufferedSink::new();
        chain.serve(request(), Params::new(), &mut sink).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!sink.is_committed());
        assert_eq!(sink.header_writes(), 0);
        assert_eq!(sink.body_writes(), 0);
    }

    #[test]
    fn test_pass_through_until_response() {
        let (before, h1) = counter();
        let (after, h3) = counter();
        let chain = HandlerChain::new()
            .add(h1)
            .add(Named)
            .add(h3);

        let mut sink = BufferedSink::new();
        let params = Params::new().with("id", "3");
        chain.serve(request(), params, &mut sink).unwrap();

        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert_eq!(sink.status(), Some(200));
        assert_eq!(sink.body(), b"{\"code\":200,\"success\":true,\"data\":\"3\"}\n");
    }

    #[test]
    fn test_done_context_not_written_twice() {
        let chain = HandlerChain::new().add_fn(|ctx| {
            ctx.text(202, "", format_args!("direct")).ok()?;
            Some(JsonResponse::new("ignored").into())
        });

        let mut sink = BufferedSink::new();
        chain.serve(request(), Params::new(), &mut sink).unwrap();

        assert_eq!(sink.status(), Some(202));
        assert_eq!(sink.body(), b"direct");
        assert_eq!(sink.header_writes(), 1);
        assert_eq!(sink.body_writes(), 1);
    }

    #[test]
    fn test_values_shared_between_handlers() {
        let chain = HandlerChain::new()
            .add_fn(|ctx| {
                ctx.set("user", "alice".to_string());
                None
            })
            .add_fn(|ctx| {
                let user = ctx.get::<String>("user").cloned().unwrap_or_default();
                Some(JsonResponse::new(user).into())
            });

        let mut sink = BufferedSink::new();
        chain.serve(request(), Params::new(), &mut sink).unwrap();
        let v: serde_json::Value = serde_json::from_slice(sink.body()).unwrap();
        assert_eq!(v["data"], "alice");
    }

    #[test]
    fn test_write_error_returned() {
        let chain = HandlerChain::new().add_fn(|_| Some(redirect("", false)));

        let mut sink = BufferedSink::new();
        let err = chain.serve(request(), Params::new(), &mut sink).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl));
        assert!(!sink.is_committed());
    }

    #[test]
    fn test_clone_shares_handlers() {
        let (calls, h) = counter();
        let chain = HandlerChain::new().add(h);
        let cloned = chain.clone();

        let mut sink = BufferedSink::new();
        chain.serve(request(), Params::new(), &mut sink).unwrap();
        cloned.serve(request(), Params::new(), &mut sink).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
