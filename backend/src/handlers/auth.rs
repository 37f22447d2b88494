use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AuthError},
    models::{
        session::{LoginResponse, Session, VerifiedSubject},
        user::{ChangePasswordRequest, LoginRequest, Permissions, RoleDescription, UserRole},
    },
    repositories::{Repository, UserRepository},
    services::LockState,
    state::AppState,
    utils::password::{hash_password, verify_password},
    validation::rules::validate_password,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user: VerifiedSubject,
    pub permissions: Permissions,
    pub expires_at: DateTime<Utc>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".into()));
    }

    let session = state
        .guard
        .authenticate(&payload.email, &payload.password, state.verifier.as_ref())
        .await?;

    let pool = state.pool.clone();
    let user_id = session.subject.id;
    let at = session.issued_at;
    tokio::spawn(async move {
        if let Err(err) = UserRepository::new().touch_last_login(&pool, user_id, at).await {
            tracing::warn!(%user_id, error = ?err, "Failed to update last login");
        }
    });

    Ok(Json(LoginResponse::from(session)))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    state.guard.logout(&session).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn me(Extension(session): Extension<Session>) -> Json<MeResponse> {
    let permissions = session.subject.role.permissions();
    Json(MeResponse {
        user: session.subject,
        permissions,
        expires_at: session.expires_at,
    })
}

/// Changes the caller's password. Every session of the caller is revoked,
/// including the one used for this request.
///
/// A wrong current password counts against the caller's login lockout.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    validate_password(&payload.new_password)
        .map_err(|err| AppError::Validation(vec![format!("new_password: {}", err.code)]))?;
    if payload.new_password == payload.current_password {
        return Err(AppError::BadRequest(
            "New password must differ from the current password".into(),
        ));
    }

    let identifier = session.subject.email.as_str();
    if let LockState::Locked { remaining_seconds } = state.guard.check_locked(identifier).await {
        return Err(AuthError::AccountLocked { remaining_seconds }.into());
    }

    let repo = UserRepository::new();
    let user = repo.find_by_id(&state.pool, session.subject.id).await?;

    let current = payload.current_password.clone();
    let stored = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&current, &stored))
        .await
        .map_err(anyhow::Error::from)??;
    if !matches {
        state.guard.record_failure(identifier).await;
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }
    state.guard.record_success(identifier).await;

    let new_password = payload.new_password;
    let new_hash = tokio::task::spawn_blocking(move || hash_password(&new_password))
        .await
        .map_err(anyhow::Error::from)??;
    repo.update_password(&state.pool, user.id, &new_hash).await?;

    state.guard.revoke_subject(user.id).await?;
    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(json!({ "message": "Password updated. Please sign in again." })))
}

pub async fn roles() -> Json<Vec<RoleDescription>> {
    Json(UserRole::ALL.iter().copied().map(RoleDescription::from).collect())
}
