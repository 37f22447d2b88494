use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorError,
    GovernorLayer,
};

use crate::config::Config;

/// Per-IP limiter for the login route. Allows `rate_limit_ip_max_requests`
/// per `rate_limit_ip_window_seconds`, replenishing evenly over the window.
pub fn create_login_rate_limiter(
    config: &Config,
) -> anyhow::Result<GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware, Body>> {
    let (burst_size, period) = limiter_params(
        config.rate_limit_ip_max_requests,
        config.rate_limit_ip_window_seconds,
    );
    let governor_conf = GovernorConfigBuilder::default()
        .period(period)
        .burst_size(burst_size)
        .key_extractor(PeerIpKeyExtractor)
        .use_headers()
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid login rate limiter configuration"))?;
    Ok(GovernorLayer::new(Arc::new(governor_conf)).error_handler(rate_limit_error_handler))
}

fn limiter_params(max_requests: u32, window_seconds: u64) -> (u32, Duration) {
    let burst_size = max_requests.max(1);
    let window_ms = window_seconds.max(1).saturating_mul(1000);
    let period_ms = (window_ms / u64::from(burst_size)).max(1);
    (burst_size, Duration::from_millis(period_ms))
}

fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!(wait_time, "Login rate limit exceeded");
            let mut response = json_error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests. Please try again later.",
                Some(wait_time),
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "RATE_LIMIT_KEY_ERROR",
            "Unable to determine request identity.",
            None,
        ),
        GovernorError::Other { code, msg, headers } => {
            let mut response = json_error_response(
                code,
                "RATE_LIMIT_ERROR",
                &msg.unwrap_or_else(|| "Rate limit error".to_string()),
                None,
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

/// Same `{error, code, details}` shape as `AppError` responses.
fn json_error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    retry_after: Option<u64>,
) -> Response<Body> {
    let mut body = serde_json::json!({
        "error": message,
        "code": code,
    });
    if let Some(retry_after) = retry_after {
        body["details"] = serde_json::json!({ "retry_after": retry_after });
    }
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(retry_after) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn limiter_params_spread_requests_over_window() {
        assert_eq!(limiter_params(15, 60), (15, Duration::from_millis(4000)));
        assert_eq!(limiter_params(0, 0), (1, Duration::from_millis(1000)));
    }

    #[test]
    fn create_login_rate_limiter_accepts_defaults_and_zeroes() {
        assert!(create_login_rate_limiter(&Config::default()).is_ok());
        let config = Config {
            rate_limit_ip_max_requests: 0,
            rate_limit_ip_window_seconds: 0,
            ..Config::default()
        };
        assert!(create_login_rate_limiter(&config).is_ok());
    }

    #[tokio::test]
    async fn too_many_requests_response_has_retry_after() {
        let response = rate_limit_error_handler(GovernorError::TooManyRequests {
            wait_time: 7,
            headers: None,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "7");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], "RATE_LIMITED");
        assert_eq!(json["details"]["retry_after"], 7);
    }
}
