use std::path::Path;

use bytes::Bytes;
use runlog::middleware::trace_id;
use runlog::{ApiLogger, Next, Request, Response, Router};

const TRACE_HEADER: &str = "x-kusion-trace";

fn request(trace: Option<&str>) -> Request {
    let mut builder = http::Request::builder()
        .method("POST")
        .uri("/runs")
        .header("content-type", "application/json");
    if let Some(trace) = trace {
        builder = builder.header(TRACE_HEADER, trace);
    }
    builder.body(Bytes::from_static(b"{}")).unwrap().into()
}

/// Reports what the middleware chain left on the request.
async fn inspect(req: Request) -> Response {
    match req.logs() {
        Some(logs) => Response::text(format!(
            "api={} run={} buffer={}",
            logs.api.name(),
            logs.run.name(),
            logs.run_buffer.len()
        )),
        None => Response::text("none"),
    }
}

/// Writes `n` records to the run log and returns the accumulated run log.
async fn apply(req: Request) -> Response {
    let Some(logs) = req.logs() else {
        return Response::text("");
    };
    let steps: usize = req.header("x-steps").and_then(|s| s.parse().ok()).unwrap_or(1);
    tokio::task::yield_now().await;
    for step in 0..steps {
        logs.run.scope(|| tracing::info!(step, "applying"));
        tokio::task::yield_now().await;
    }
    Response::text(logs.run_buffer.to_string_lossy())
}

fn app(log_dir: &Path) -> Router {
    Router::new()
        .layer(trace_id::propagate)
        .layer(ApiLogger::new(log_dir))
        .post("/runs", inspect)
        .post("/apply", apply)
}

fn body(res: &Response) -> String {
    String::from_utf8(res.body().to_vec()).unwrap()
}

#[tokio::test]
async fn traced_request_gets_loggers_named_by_trace_id() {
    let tmp = tempfile::tempdir().unwrap();
    let log_dir = tmp.path().join("var/log/app");

    let res = app(&log_dir).handle(request(Some("abc123"))).await.unwrap();

    assert_eq!(body(&res), "api=abc123 run=abc123 buffer=0");
    let api_log = std::fs::read_to_string(log_dir.join("abc123")).unwrap();
    assert!(api_log.contains("x-kusion-trace: abc123"));
    assert!(api_log.contains("request received"));
    assert!(api_log.contains("path=\"/runs\"") || api_log.contains("path=/runs"));
}

#[tokio::test]
async fn untraced_request_passes_through_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let log_dir = tmp.path().join("app");

    for trace in [None, Some(""), Some("   ")] {
        let res = app(&log_dir).handle(request(trace)).await.unwrap();
        assert_eq!(body(&res), "none");
    }

    assert!(!log_dir.exists());
}

#[tokio::test]
async fn untraced_request_reaches_handler_with_same_headers_and_body() {
    let tmp = tempfile::tempdir().unwrap();
    let app = Router::new()
        .layer(trace_id::propagate)
        .layer(ApiLogger::new(tmp.path()))
        .post("/runs", |req: Request| async move {
            assert!(req.trace_id().is_none());
            assert!(req.logs().is_none());
            assert_eq!(req.headers().len(), 1);
            assert_eq!(req.body(), b"{}");
            Response::text("seen")
        });

    let res = app.handle(request(None)).await.unwrap();

    assert_eq!(body(&res), "seen");
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn concurrent_requests_get_separate_run_buffers() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path());

    let with_steps = |trace: &str, steps: usize| -> Request {
        http::Request::post("/apply")
            .header(TRACE_HEADER, trace)
            .header("x-steps", steps.to_string())
            .body(Bytes::new())
            .unwrap()
            .into()
    };

    let (a, b) = tokio::join!(
        app.handle(with_steps("trace-a", 5)),
        app.handle(with_steps("trace-b", 2)),
    );
    let (a, b) = (body(&a.unwrap()), body(&b.unwrap()));

    assert_eq!(a.lines().count(), 5);
    assert_eq!(b.lines().count(), 2);
    assert!(a.lines().all(|line| line.contains("trace-a")));
    assert!(b.lines().all(|line| line.contains("trace-b")));
    assert!(tmp.path().join("trace-a").is_file());
    assert!(tmp.path().join("trace-b").is_file());
}

#[tokio::test]
async fn run_buffer_outlives_the_handler_only_through_the_response() {
    let tmp = tempfile::tempdir().unwrap();
    let app = Router::new()
        .layer(trace_id::propagate)
        .layer(ApiLogger::new(tmp.path()))
        .layer(|req: Request, next: Next| async move {
            // Keep a handle to the buffer so the run log can be read after
            // the handler returns.
            let buffer = req.logs().map(|logs| logs.run_buffer.clone());
            let res = next.run(req).await?;
            let logged = buffer.map(|b| b.len()).unwrap_or(0);
            Ok::<_, runlog::Error>(Response::text(format!(
                "{} {logged}",
                String::from_utf8_lossy(res.body())
            )))
        })
        .post("/apply", apply);

    let req: Request = http::Request::post("/apply")
        .header(TRACE_HEADER, "abc123")
        .body(Bytes::new())
        .unwrap()
        .into();
    let res = app.handle(req).await.unwrap();
    let text = body(&res);

    let (run_log, logged) = text.rsplit_once(' ').unwrap();
    assert!(run_log.contains("applying"));
    assert_eq!(logged.parse::<usize>().unwrap(), run_log.len());
}

#[tokio::test]
async fn unusable_log_dir_is_reported_as_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let not_a_dir = tmp.path().join("plain-file");
    std::fs::write(&not_a_dir, b"").unwrap();

    let err = app(&not_a_dir).handle(request(Some("abc123"))).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("plain-file"));
}
