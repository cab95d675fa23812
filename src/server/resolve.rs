//! Seam to the external router.

use std::sync::Arc;

use http::Method;

use crate::core::Params;
use crate::handler::HandlerChain;

/// Resolves a request line to a handler chain and its path parameters.
///
/// Routing itself lives outside this crate; any matcher can be plugged in.
/// Closures with the matching signature implement this trait.
pub trait Resolve: Send + Sync + 'static {
    fn resolve(&self, method: &Method, path: &str) -> Option<(Arc<HandlerChain>, Params)>;
}

impl<F> Resolve for F
where
    F: Fn(&Method, &str) -> Option<(Arc<HandlerChain>, Params)> + Send + Sync + 'static,
{
    fn resolve(&self, method: &Method, path: &str) -> Option<(Arc<HandlerChain>, Params)> {
        self(method, path)
    }
}
