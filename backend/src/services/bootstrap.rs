//! First-run administrator provisioning.

use sqlx::PgPool;

use crate::config::Config;
use crate::models::user::{User, UserRole};
use crate::repositories::repository::Repository;
use crate::repositories::user::UserRepository;
use crate::utils::password::hash_password;
use crate::validation::rules::validate_password;

/// Creates the configured administrator when the user table is empty.
///
/// Returns the created account, or `None` when users already exist or no
/// bootstrap credentials are configured.
pub async fn ensure_bootstrap_admin(pool: &PgPool, config: &Config) -> anyhow::Result<Option<User>> {
    let repo = UserRepository::new();
    let existing = repo
        .count(pool)
        .await
        .map_err(|err| anyhow::anyhow!("failed to count users: {:?}", err))?;
    if existing > 0 {
        return Ok(None);
    }

    let (Some(email), Some(password)) = (
        config.bootstrap_admin_email.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        tracing::warn!("No users exist and BOOTSTRAP_ADMIN_EMAIL/BOOTSTRAP_ADMIN_PASSWORD are not set");
        return Ok(None);
    };

    validate_password(password)
        .map_err(|err| anyhow::anyhow!("BOOTSTRAP_ADMIN_PASSWORD rejected: {}", err.code))?;

    let hash = hash_password(password)?;
    let admin = User::new(
        email,
        "Administrateur".to_string(),
        UserRole::Admin,
        hash,
        "Administration".to_string(),
        String::new(),
    );
    let created = repo
        .create(pool, &admin)
        .await
        .map_err(|err| anyhow::anyhow!("failed to create bootstrap admin: {:?}", err))?;

    tracing::info!(user_id = %created.id, email = %created.email, "Bootstrap administrator created");
    Ok(Some(created))
}
