//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered
//! with [`Router::layer`] wraps every route, including the `404` fallback.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    layers: Arc<[BoxedMiddleware]>,
    fallback: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            layers: Vec::new().into(),
            fallback: not_found.into_boxed_handler(),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use runlog::{Request, Response, Router};
    /// # async fn get_run(_: Request) -> Response { Response::text("") }
    /// Router::new().on(http::Method::GET, "/runs/{id}", get_run);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with an existing one.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Append a middleware. The first layer registered runs first.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let mut layers = self.layers.to_vec();
        layers.push(Arc::new(middleware));
        self.layers = layers.into();
        self
    }

    /// Runs `req` through the middleware chain and the matched handler.
    ///
    /// # Errors
    ///
    /// Whatever error a middleware layer returns; see [`Error::is_fatal`].
    pub async fn handle(&self, mut req: Request) -> Result<Response, Error> {
        let endpoint = match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.params = params;
                handler
            }
            None => Arc::clone(&self.fallback),
        };
        Next::new(Arc::clone(&self.layers), endpoint).run(req).await
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

async fn not_found(_req: Request) -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;

    fn get(path: &str) -> Request {
        http::Request::builder().uri(path).body(Bytes::new()).unwrap().into()
    }

    async fn show(req: Request) -> String {
        req.param("id").unwrap_or("none").to_owned()
    }

    #[tokio::test]
    async fn routes_by_method_and_path() {
        let app = Router::new().get("/runs/{id}", show);

        let res = app.handle(get("/runs/42")).await.unwrap();
        assert_eq!(res.body(), b"42");

        let res = app.handle(get("/stacks")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

        let post = http::Request::post("/runs/42").body(Bytes::new()).unwrap().into();
        let res = app.handle(post).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn layers_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (Arc::clone(&seen), Arc::clone(&seen));

        let app = Router::new()
            .layer(move |req: Request, next: Next| {
                first.lock().push("first");
                next.run(req)
            })
            .layer(move |req: Request, next: Next| {
                second.lock().push("second");
                next.run(req)
            })
            .get("/runs/{id}", show);

        app.handle(get("/runs/1")).await.unwrap();
        app.handle(get("/missing")).await.unwrap();

        assert_eq!(*seen.lock(), ["first", "second", "first", "second"]);
    }

    #[tokio::test]
    async fn layer_errors_short_circuit() {
        let app = Router::new()
            .layer(|_req: Request, _next: Next| async {
                Err::<Response, _>(Error::from(std::io::Error::other("boom")))
            })
            .get("/", show);

        assert!(app.handle(get("/")).await.is_err());
    }
}
