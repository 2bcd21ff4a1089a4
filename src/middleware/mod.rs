//! Middleware layer.
//!
//! Middleware wraps the route handler and is the place for cross-cutting
//! concerns. Each layer receives the request and a [`Next`] that runs the
//! rest of the chain:
//!
//! ```text
//! propagate → DefaultLogger → ApiLogger → handler
//! ```
//!
//! A layer may enrich the request before delegating, inspect the response
//! afterwards, or stop the chain with an [`Error`]. Fatal errors
//! ([`Error::is_fatal`]) stop the server.
//!
//! Built-in layers:
//! - [`trace_id::propagate`]: reads the trace ID from the `x-kusion-trace` header
//! - [`ApiLogger`]: per-request API logger, run logger and run buffer
//! - [`DefaultLogger`]: one shared request log for every request
//!
//! Any `async` closure of the right shape is middleware too:
//!
//! ```rust
//! use runlog::{Request, Router, middleware::Next};
//!
//! let app = Router::new().layer(|req: Request, next: Next| async move {
//!     next.run(req).await
//! });
//! ```

mod api_logger;
mod default_logger;
pub mod trace_id;

use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

pub use api_logger::ApiLogger;
pub use default_logger::DefaultLogger;

/// A layer in the request pipeline.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture<Result<Response, Error>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture<Result<Response, Error>> {
        Box::pin(self(req, next))
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of the middleware chain, ending at the route handler.
pub struct Next {
    layers: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(layers: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { layers, index: 0, endpoint }
    }

    /// Runs the next layer, or the handler once every layer has run.
    pub async fn run(mut self, req: Request) -> Result<Response, Error> {
        match self.layers.get(self.index).cloned() {
            Some(layer) => {
                self.index += 1;
                layer.call(req, self).await
            }
            None => Ok(self.endpoint.call(req).await),
        }
    }
}
