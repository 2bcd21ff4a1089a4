//! Per-request structured loggers.
//!
//! A [`Logger`] is a named `tracing` dispatcher bound to one write target.
//! It is independent of the process-wide subscriber: records emitted inside
//! [`Logger::scope`] go only to the logger's own writer, so a handler can
//! use the ordinary `tracing` macros and have them land in a per-request
//! file or run log buffer.
//!
//! ```rust
//! use runlog::logger::Logger;
//!
//! let (run, buffer) = Logger::buffer("abc123");
//! run.scope(|| tracing::info!(step = 1, "applying stack"));
//! assert!(buffer.to_string_lossy().contains("applying stack"));
//! ```

mod buffer;
pub mod destination;

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Mutex;

use tracing::{Dispatch, Level, info_span};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::ChronoUtc;

use crate::error::Error;
use crate::request::Request;

pub use buffer::RunLogBuffer;

/// Header that correlates log records with the originating HTTP trace.
pub const TRACE_HEADER: &str = "x-kusion-trace";

/// Headers whose values never reach a log file.
const SENSITIVE_HEADERS: &[&str] =
    &["authorization", "proxy-authorization", "cookie", "set-cookie", "x-api-key"];

/// Formatting and filtering shared by every logger the crate builds.
#[derive(Clone, Debug)]
pub struct LoggerOptions {
    /// Most verbose level recorded.
    pub level: Level,
    /// Single-line compact records instead of the full format.
    pub concise: bool,
    /// Record incoming request headers in [`Logger::log_request`].
    pub request_headers: bool,
    /// Header name used to tie records back to their trace.
    pub trace_header: String,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            concise: true,
            request_headers: true,
            trace_header: TRACE_HEADER.to_owned(),
        }
    }
}

/// A named structured logger bound to one writer.
///
/// Clones share the writer. For a file-backed logger the file is closed when
/// the last clone is dropped.
#[derive(Clone)]
pub struct Logger {
    name: String,
    options: LoggerOptions,
    dispatch: Dispatch,
}

impl Logger {
    /// Builds a logger with the default options.
    pub fn new<W>(writer: W, name: impl Into<String>) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        Self::with_options(writer, name, LoggerOptions::default())
    }

    pub fn with_options<W>(writer: W, name: impl Into<String>, options: LoggerOptions) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let builder = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_max_level(options.level)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_target(false);

        let dispatch = if options.concise {
            Dispatch::new(builder.compact().finish())
        } else {
            Dispatch::new(builder.finish())
        };

        Self { name: name.into(), options, dispatch }
    }

    /// A logger appending to the file at `path`, creating its directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// The fatal destination errors of [`destination::resolve`].
    pub fn file(path: &Path, name: impl Into<String>) -> Result<Self, Error> {
        Self::file_with_options(path, name, LoggerOptions::default())
    }

    pub fn file_with_options(
        path: &Path,
        name: impl Into<String>,
        options: LoggerOptions,
    ) -> Result<Self, Error> {
        let file = destination::resolve(path)?;
        Ok(Self::with_options(Mutex::new(file), name, options))
    }

    /// A logger writing into a fresh [`RunLogBuffer`], returned alongside it.
    pub fn buffer(name: impl Into<String>) -> (Self, RunLogBuffer) {
        Self::buffer_with_options(name, LoggerOptions::default())
    }

    pub fn buffer_with_options(name: impl Into<String>, options: LoggerOptions) -> (Self, RunLogBuffer) {
        let buffer = RunLogBuffer::new();
        (Self::with_options(buffer.clone(), name, options), buffer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &LoggerOptions {
        &self.options
    }

    /// Runs `f` with this logger as the default `tracing` dispatcher.
    ///
    /// Records are nested under a `log` span carrying the logger name.
    /// The dispatcher is thread-local for the duration of the call, so do
    /// not hold it across an `.await`.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let span = info_span!("log", logger = %self.name);
            let _entered = span.enter();
            f()
        })
    }

    pub fn info(&self, message: &str) {
        self.scope(|| tracing::info!("{message}"));
    }

    pub fn warn(&self, message: &str) {
        self.scope(|| tracing::warn!("{message}"));
    }

    pub fn error(&self, message: &str) {
        self.scope(|| tracing::error!("{message}"));
    }

    /// Records an incoming request: method, path and headers.
    ///
    /// The trace header always comes first, built from the request's trace
    /// ID, so every record can be joined back to its HTTP trace.
    pub fn log_request(&self, req: &Request) {
        let headers = self.format_headers(req);
        self.scope(|| {
            tracing::info!(
                method = %req.method(),
                path = req.path(),
                headers = %headers,
                "request received"
            )
        });
    }

    fn format_headers(&self, req: &Request) -> String {
        let trace_header = self.options.trace_header.as_str();
        let mut out = String::new();

        if let Some(trace_id) = req.trace_id() {
            let _ = write!(out, "{trace_header}: {trace_id}");
        }
        if !self.options.request_headers {
            return out;
        }

        let traced = req.trace_id().is_some();
        for (name, value) in req.headers() {
            // Already written first when the request carries a trace ID.
            if traced && name.as_str().eq_ignore_ascii_case(trace_header) {
                continue;
            }
            if !out.is_empty() {
                out.push_str(", ");
            }
            if SENSITIVE_HEADERS.contains(&name.as_str()) {
                let _ = write!(out, "{name}: [REDACTED]");
            } else {
                let _ = write!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
            }
        }
        out
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The per-request logging state injected by
/// [`ApiLogger`](crate::middleware::ApiLogger).
#[derive(Clone, Debug)]
pub struct RequestLogs {
    /// File-backed logger for API activity on this request.
    pub api: Logger,
    /// Buffer-backed logger for the run this request drives.
    pub run: Logger,
    /// The bytes written through `run`, readable by handlers.
    pub run_buffer: RunLogBuffer,
}
