//! # runlog
//!
//! Request-scoped logging for a minimal hyper HTTP server.
//!
//! Every traced request gets its own pair of loggers, keyed by the trace ID
//! from the `x-kusion-trace` header:
//!
//! - an **API logger** appending to `<log_dir>/<trace id>`, and
//! - a **run logger** writing into an in-memory [`RunLogBuffer`] that the
//!   handler can read back, e.g. to return a run's execution log in the
//!   API response.
//!
//! Both live exactly as long as the request. A [`DefaultLogger`] can sit in
//! front of them and record every request, traced or not, to one shared
//! file.
//!
//! A log destination that cannot be opened is fatal: the server stops and
//! [`Server::serve`] returns the error.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use runlog::middleware::{ApiLogger, DefaultLogger, trace_id};
//! use runlog::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), runlog::Error> {
//!     let app = Router::new()
//!         .layer(trace_id::propagate)
//!         .layer(DefaultLogger::new("/var/log/app/requests.log")?)
//!         .layer(ApiLogger::new("/var/log/app"))
//!         .post("/runs", apply);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn apply(req: Request) -> Response {
//!     let Some(logs) = req.logs() else {
//!         return Response::text("untraced");
//!     };
//!     logs.api.info("apply requested");
//!     logs.run.scope(|| tracing::info!(resources = 3, "stack applied"));
//!     Response::text(logs.run_buffer.to_string_lossy())
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod logger;
pub mod middleware;

pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use logger::{Logger, LoggerOptions, RequestLogs, RunLogBuffer};
pub use middleware::{ApiLogger, DefaultLogger, Middleware, Next};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
