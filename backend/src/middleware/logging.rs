use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Request, StatusCode},
    middleware::Next,
    response::Response,
    Error as AxumError,
};
use std::time::Instant;

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_BODY_BYTES: usize = 1024;

struct ErrorEvent<'a> {
    status: StatusCode,
    method: &'a str,
    path: &'a str,
    latency_ms: u64,
}

/// Logs every 4xx/5xx response with its JSON error body.
///
/// Only the path is logged, never the query string, and the body is buffered
/// so it can still be forwarded unchanged.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let event = ErrorEvent {
        status,
        method: &method,
        path: &path,
        latency_ms: start.elapsed().as_millis() as u64,
    };
    let (mut parts, body) = response.into_parts();
    match buffer_body(body).await {
        Ok(bytes) => {
            event.log(&preview(&bytes));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            event.log_body_error(&err);
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::empty())
        }
    }
}

async fn buffer_body(body: Body) -> Result<Bytes, AxumError> {
    to_bytes(body, MAX_BUFFERED_BODY_BYTES).await
}

fn preview(bytes: &Bytes) -> String {
    if bytes.len() > MAX_LOGGED_BODY_BYTES {
        format!(
            "{}... (truncated, {} bytes total)",
            String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY_BYTES]),
            bytes.len()
        )
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

impl ErrorEvent<'_> {
    fn log(&self, body: &str) {
        let status = self.status.as_u16();
        if self.status.is_server_error() {
            tracing::error!(
                status,
                method = self.method,
                path = self.path,
                latency_ms = self.latency_ms,
                body,
                "Request completed with error status"
            );
        } else {
            tracing::warn!(
                status,
                method = self.method,
                path = self.path,
                latency_ms = self.latency_ms,
                body,
                "Request completed with error status"
            );
        }
    }

    fn log_body_error(&self, err: &AxumError) {
        tracing::error!(
            status = self.status.as_u16(),
            method = self.method,
            path = self.path,
            latency_ms = self.latency_ms,
            error = ?err,
            "Failed to read error response body"
        );
    }
}
