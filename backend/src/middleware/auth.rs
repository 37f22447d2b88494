use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, models::session::Session, state::AppState};

/// Resolves the bearer session and makes it available as `Extension<Session>`.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = authenticate_request(request.headers(), &state).await?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

// Auth + require user-management permission for admin-only routes
pub async fn auth_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = authenticate_request(request.headers(), &state).await?;
    if !session.subject.role.permissions().can_manage_users {
        tracing::warn!(user_id = %session.subject.id, role = %session.subject.role, "Admin route refused");
        return Err(AppError::Forbidden("Administrator access required".into()));
    }
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
}

async fn authenticate_request(headers: &HeaderMap, state: &AppState) -> Result<Session, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    state
        .guard
        .current_session(token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Session expired or invalid".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parse_bearer_token_accepts_any_scheme_case() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("BEARER   abc "), Some("abc"));
    }

    #[test]
    fn parse_bearer_token_rejects_other_schemes_and_empty_tokens() {
        assert_eq!(parse_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
        assert_eq!(parse_bearer_token("Bearer"), None);
    }

    #[test]
    fn bearer_token_reads_authorization_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert_eq!(bearer_token(&headers), Some("tok"));
    }
}
