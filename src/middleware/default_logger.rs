//! Baseline request logging to one shared file.

use std::path::Path;
use std::time::Instant;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::logger::{Logger, LoggerOptions};
use crate::middleware::trace_id::get_trace_id;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Logs every request, traced or not, to a single file.
///
/// The logger is opened once, when the middleware is built, and shared by
/// all requests. Each request produces a `request received` record on
/// arrival and a `request completed` record with status and latency.
#[derive(Clone, Debug)]
pub struct DefaultLogger {
    logger: Logger,
}

impl DefaultLogger {
    pub const NAME: &'static str = "DefaultLogger";

    /// # Errors
    ///
    /// The fatal destination errors of opening `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::with_options(path, LoggerOptions::default())
    }

    pub fn with_options(path: impl AsRef<Path>, options: LoggerOptions) -> Result<Self, Error> {
        let logger = Logger::file_with_options(path.as_ref(), Self::NAME, options)?;
        Ok(Self { logger })
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl Middleware for DefaultLogger {
    fn call(&self, req: Request, next: Next) -> BoxFuture<Result<Response, Error>> {
        let logger = self.logger.clone();
        logger.log_request(&req);

        let method = req.method().clone();
        let path = req.path().to_owned();
        let trace_id = get_trace_id(&req).to_owned();
        let started = Instant::now();

        Box::pin(async move {
            let res = next.run(req).await?;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            logger.scope(|| {
                tracing::info!(
                    %method,
                    %path,
                    trace_id = %trace_id,
                    status = res.status_code().as_u16(),
                    elapsed_ms,
                    "request completed"
                )
            });
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::Router;
    use crate::logger::TRACE_HEADER;
    use crate::middleware::trace_id::propagate;

    async fn ok(_req: Request) -> Response {
        Response::text("ok")
    }

    #[tokio::test]
    async fn logs_every_request_with_status() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs/default.log");
        let default_logger = DefaultLogger::new(&path).unwrap();
        assert_eq!(default_logger.logger().name(), DefaultLogger::NAME);
        let app = Router::new()
            .layer(propagate)
            .layer(default_logger)
            .get("/", ok);

        for trace in [Some("abc123"), None] {
            let mut builder = http::Request::builder().uri("/");
            if let Some(trace) = trace {
                builder = builder.header(TRACE_HEADER, trace);
            }
            app.handle(builder.body(Bytes::new()).unwrap().into()).await.unwrap();
        }
        app.handle(http::Request::builder().uri("/missing").body(Bytes::new()).unwrap().into())
            .await
            .unwrap();

        let out = std::fs::read_to_string(&path).unwrap();
        assert_eq!(out.matches("request received").count(), 3);
        assert_eq!(out.matches("request completed").count(), 3);
        assert!(out.contains("x-kusion-trace: abc123"));
        assert!(out.contains("status=404"));
        assert_eq!(out.matches("elapsed_ms=").count(), 3);
        assert!(out.contains("DefaultLogger"));
    }

    #[test]
    fn unusable_path_fails_at_construction() {
        let tmp = tempfile::tempdir().unwrap();

        let err = DefaultLogger::new(tmp.path()).unwrap_err();

        assert!(err.is_fatal());
    }
}
