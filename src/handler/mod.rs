//! Handler chains.
//!
//! A request is processed by an ordered list of handlers sharing one
//! [`Context`]. Each handler either passes (`None`), or returns a
//! [`Response`] that stops the chain:
//!
//! - [`BREAK`](crate::response::BREAK) stops without writing anything
//! - any other response is written, unless the handler already wrote output
//!
//! # Example
//!
//! ```rust,ignore
//! use chainserve::handler::HandlerChain;
//! use chainserve::response::{common, JsonResponse};
//!
//! let chain = HandlerChain::new()
//!     .add_fn(|ctx| {
//!         if ctx.req.header("authorization").is_none() {
//!             return Some(common::forbidden());
//!         }
//!         None
//!     })
//!     .add_fn(|ctx| Some(JsonResponse::new(ctx.path()).into()));
//! ```

mod chain;

pub use chain::HandlerChain;

use crate::core::Context;
use crate::response::Response;

/// One step of a handler chain.
pub trait Handler: Send + Sync {
    /// Name used in debug logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Handle the request. `None` passes control to the next handler.
    fn handle(&self, ctx: &mut Context<'_>) -> Option<Response>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context<'_>) -> Option<Response> + Send + Sync,
{
    fn handle(&self, ctx: &mut Context<'_>) -> Option<Response> {
        self(ctx)
    }
}
