//! HTTP server and graceful shutdown.
//!
//! The server stops accepting connections on SIGTERM / Ctrl-C, tells every
//! open connection to close once its in-flight request is answered (idle
//! keep-alive connections close at once) and then returns from
//! [`Server::serve`].
//!
//! It also stops on a fatal middleware error ([`Error::is_fatal`]): the
//! failing request receives `500`, the accept loop ends, connections drain
//! the same way, and `serve` returns the error so `main` can exit non-zero.
//!
//! ```rust,no_run
//! use runlog::{Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new();
//!     if let Err(e) = Server::bind("0.0.0.0:3000").serve(app).await {
//!         eprintln!("{e}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns `Ok(())` after a graceful shutdown, or the first fatal error
    /// raised while handling a request.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "runlog listening");
        run(listener, router, shutdown_signal()).await
    }
}

/// The accept loop, shared by [`Server::serve`] and the tests.
pub(crate) async fn run(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    let router = Arc::new(router);
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<Error>(1);
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut fatal = None;
    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            Some(err) = fatal_rx.recv() => {
                error!(in_flight = tasks.len(), "fatal error, shutting down: {err}");
                fatal = Some(err);
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let fatal_tx = fatal_tx.clone();
                let mut stop_rx = stop_rx.clone();
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        let fatal_tx = fatal_tx.clone();
                        async move { dispatch(router, req, fatal_tx).await }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    let conn = builder.serve_connection(io, svc);
                    tokio::pin!(conn);

                    let res = tokio::select! {
                        res = conn.as_mut() => res,
                        _ = stop_rx.changed() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                    };
                    if let Err(e) = res {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Keep-alive connections would otherwise hold the drain open forever.
    let _ = stop_tx.send(true);
    while tasks.join_next().await.is_some() {}

    info!("runlog stopped");
    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Collects the body, runs the router, and reports fatal errors to the
/// accept loop. Never fails towards hyper.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    fatal_tx: mpsc::Sender<Error>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let response = match router.handle(Request::from_parts(parts, body)).await {
        Ok(response) => response,
        Err(e) if e.is_fatal() => {
            // Only the first fatal error is kept; the loop is already stopping.
            let _ = fatal_tx.try_send(e);
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            error!("request failed: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or SIGINT (Ctrl-C only on non-Unix platforms).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
