//! Administrator endpoints for accounts and lockouts.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{
        session::Session,
        user::{normalize_email, CreateUser, UpdateUser, User, UserResponse},
    },
    repositories::{Repository, UserRepository},
    state::AppState,
    types::UserId,
    utils::{
        password::hash_password,
        time::{seconds_until, Clock},
    },
    validation::{rules::validate_password, validate_payload, Violations},
};
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LockoutStatus {
    pub identifier: String,
    pub failure_count: u32,
    pub locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<u64>,
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = UserRepository::new().find_all(&state.pool).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut rules = Violations::new();
    rules.check("password", validate_password(&payload.password));
    validate_payload(&payload, rules)?;

    let repo = UserRepository::new();
    let email = normalize_email(&payload.email);
    if repo.find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("A user with this email already exists".into()));
    }

    let password = payload.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;

    let user = User::new(
        &email,
        payload.name.trim().to_string(),
        payload.role,
        hash,
        payload.department.unwrap_or_default(),
        payload.phone.unwrap_or_default(),
    );
    let created = repo.create(&state.pool, &user).await?;
    tracing::info!(
        user_id = %created.id,
        role = %created.role,
        created_by = %session.subject.id,
        "User created"
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    let user = UserRepository::new().find_by_id(&state.pool, id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Applies a partial update. A role or activation change revokes the
/// account's session so the next request re-authenticates.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<UserId>,
    Json(payload): Json<UpdateUser>,
) -> Result<Json<UserResponse>, AppError> {
    validate_payload(&payload, Violations::new())?;
    if id == session.subject.id && payload.is_active == Some(false) {
        return Err(AppError::BadRequest("You cannot deactivate your own account".into()));
    }

    let repo = UserRepository::new();
    let mut user = repo.find_by_id(&state.pool, id).await?;
    if is_bootstrap_admin(&state, &user) && payload.is_active == Some(false) {
        return Err(AppError::Forbidden(
            "The bootstrap administrator cannot be deactivated".into(),
        ));
    }

    let access_changed = payload.apply_to(&mut user);
    let updated = repo.update(&state.pool, &user).await?;
    if access_changed {
        state.guard.revoke_subject(updated.id).await?;
    }
    tracing::info!(user_id = %updated.id, access_changed, updated_by = %session.subject.id, "User updated");
    Ok(Json(UserResponse::from(updated)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    if id == session.subject.id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }

    let repo = UserRepository::new();
    let user = repo.find_by_id(&state.pool, id).await?;
    if is_bootstrap_admin(&state, &user) {
        return Err(AppError::Forbidden(
            "The bootstrap administrator cannot be deleted".into(),
        ));
    }

    state.guard.revoke_subject(id).await?;
    repo.delete(&state.pool, id).await?;
    tracing::info!(user_id = %id, deleted_by = %session.subject.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_lockout(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<LockoutStatus>, AppError> {
    let identifier = normalize_email(&email);
    let now = state.clock.now();
    let record = state.guard.attempt_record(&identifier).await?;

    let status = match record {
        Some(record) => {
            let locked = record.is_locked_at(now);
            LockoutStatus {
                identifier: record.identifier,
                failure_count: record.failure_count,
                locked,
                locked_until: record.locked_until,
                remaining_seconds: record
                    .locked_until
                    .filter(|_| locked)
                    .map(|until| seconds_until(now, until)),
            }
        }
        None => LockoutStatus {
            identifier,
            failure_count: 0,
            locked: false,
            locked_until: None,
            remaining_seconds: None,
        },
    };
    Ok(Json(status))
}

pub async fn clear_lockout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(email): Path<String>,
) -> Result<Json<Value>, AppError> {
    let cleared = state.guard.clear_lock(&email).await?;
    tracing::info!(identifier = %normalize_email(&email), cleared, cleared_by = %session.subject.id, "Lockout clear requested");
    Ok(Json(json!({ "cleared": cleared })))
}

fn is_bootstrap_admin(state: &AppState, user: &User) -> bool {
    state
        .config
        .bootstrap_admin_email
        .as_deref()
        .is_some_and(|email| normalize_email(email) == user.email)
}
