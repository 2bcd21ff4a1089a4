//! Trace ID extraction.
//!
//! The trace ID is the correlation token every per-request log is keyed by.
//! [`propagate`] copies it from the incoming `x-kusion-trace` header onto the
//! request; [`get_trace_id`] is the read side used by the logging layers.

use crate::error::Error;
use crate::logger::TRACE_HEADER;
use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

/// The request's trace ID, or `""` when it has none.
pub fn get_trace_id(req: &Request) -> &str {
    req.trace_id().unwrap_or("")
}

/// Middleware that sets the trace ID from the `x-kusion-trace` header.
///
/// Surrounding whitespace is trimmed; a missing or blank header leaves the
/// request untraced. An ID already set by an earlier layer wins.
pub async fn propagate(mut req: Request, next: Next) -> Result<Response, Error> {
    if req.trace_id().is_none() {
        let header = req.header(TRACE_HEADER).map(str::trim).unwrap_or("");
        if !header.is_empty() {
            let trace_id = header.to_owned();
            req.set_trace_id(trace_id);
        }
    }
    next.run(req).await
}
