//! runlog demo: a run endpoint that returns its own execution log.
//!
//! Run with:
//!   RUST_LOG=info RUNLOG_DIR=/tmp/runlog cargo run --example run_logs
//!
//! Try:
//!   curl -X POST -H 'x-kusion-trace: abc123' http://localhost:3000/runs/dev
//!   cat /tmp/runlog/abc123 /tmp/runlog/requests.log
//!   curl -X POST http://localhost:3000/runs/dev      # untraced: no run log

use std::path::PathBuf;

use runlog::middleware::{ApiLogger, DefaultLogger, trace_id};
use runlog::{Request, Response, Router, Server};
use tracing::error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let log_dir = std::env::var_os("RUNLOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logs"));

    let default_logger = match DefaultLogger::new(log_dir.join("requests.log")) {
        Ok(logger) => logger,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .layer(trace_id::propagate)
        .layer(default_logger)
        .layer(ApiLogger::new(&log_dir))
        .post("/runs/{stack}", run);

    if let Err(e) = Server::bind("0.0.0.0:3000").serve(app).await {
        error!("{e}");
        std::process::exit(1);
    }
}

// POST /runs/:stack
//
// The run log is collected in memory for the duration of the request and
// handed back as the response body.
async fn run(req: Request) -> Response {
    let stack = req.param("stack").unwrap_or("default").to_owned();
    let Some(logs) = req.logs() else {
        return Response::text(format!("applied {stack} (untraced, no run log)\n"));
    };

    logs.api.info("run requested");
    logs.run.scope(|| {
        tracing::info!(%stack, "generating spec");
        tracing::info!(%stack, resources = 3, "previewing changes");
        tracing::info!(%stack, "apply succeeded");
    });

    Response::text(logs.run_buffer.to_string_lossy())
}
