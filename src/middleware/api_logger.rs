//! Request-scoped API and run loggers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::logger::{Logger, LoggerOptions, RequestLogs};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Injects a [`RequestLogs`] into every traced request.
///
/// For a request with trace ID `abc123` and log directory `/var/log/app`:
///
/// 1. an API logger named `abc123` appending to `/var/log/app/abc123`,
///    which immediately records the incoming request,
/// 2. a run logger named `abc123` writing into a fresh run buffer,
///
/// are stored on the request before the next layer runs. Untraced requests
/// pass through untouched. A log file that cannot be opened is a fatal
/// error.
#[derive(Clone, Debug)]
pub struct ApiLogger {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    log_dir: PathBuf,
    options: LoggerOptions,
}

impl ApiLogger {
    /// Longest sanitised trace ID used verbatim as a file name.
    pub const MAX_FILE_NAME: usize = 200;

    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self::with_options(log_dir, LoggerOptions::default())
    }

    pub fn with_options(log_dir: impl Into<PathBuf>, options: LoggerOptions) -> Self {
        Self { inner: Arc::new(Inner { log_dir: log_dir.into(), options }) }
    }

    pub fn log_dir(&self) -> &Path {
        &self.inner.log_dir
    }

    /// The API log file for `trace_id`.
    ///
    /// The trace ID comes from a request header, so anything outside
    /// `[A-Za-z0-9._-]` becomes `_` and a bare `.`/`..` is neutralised; the
    /// result always names a file directly inside the log directory.
    ///
    /// Names longer than [`MAX_FILE_NAME`](Self::MAX_FILE_NAME) bytes are cut
    /// and suffixed with a digest of the full trace ID, so an oversized
    /// header can never make the open fail.
    pub fn log_path(&self, trace_id: &str) -> PathBuf {
        let mut file_name: String = trace_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect();
        if file_name.chars().all(|c| c == '.') {
            file_name = file_name.replace('.', "_");
        }
        if file_name.len() > Self::MAX_FILE_NAME {
            // ASCII only at this point, so any byte index is a char boundary.
            let digest = Sha256::digest(trace_id.as_bytes());
            file_name.truncate(Self::MAX_FILE_NAME);
            file_name.push('-');
            file_name.push_str(&hex::encode(&digest[..8]));
        }
        self.inner.log_dir.join(file_name)
    }

    /// Builds the loggers for one traced request.
    ///
    /// # Errors
    ///
    /// The fatal destination errors of opening the API log file.
    pub fn request_logs(&self, trace_id: &str) -> Result<RequestLogs, Error> {
        let options = &self.inner.options;
        let api = Logger::file_with_options(&self.log_path(trace_id), trace_id, options.clone())?;
        let (run, run_buffer) = Logger::buffer_with_options(trace_id, options.clone());
        Ok(RequestLogs { api, run, run_buffer })
    }
}

impl Middleware for ApiLogger {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture<Result<Response, Error>> {
        let logs = match req.trace_id().map(|trace_id| self.request_logs(trace_id)) {
            Some(Ok(logs)) => logs,
            Some(Err(e)) => return Box::pin(async move { Err(e) }),
            None => return Box::pin(next.run(req)),
        };

        logs.api.log_request(&req);
        req.set_logs(logs);
        Box::pin(next.run(req))
    }
}
