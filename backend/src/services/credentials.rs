//! Credential verification against the user store.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::session::VerifiedSubject;
use crate::models::user::normalize_email;
use crate::repositories::user::UserRepository;
use crate::utils::password::{burn_verification, verify_password};

/// Checks an identifier/secret pair.
///
/// `Ok(None)` covers every rejection (unknown identifier, wrong secret,
/// inactive account); `Err` means the check itself could not be performed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> anyhow::Result<Option<VerifiedSubject>>;
}

/// Verifies against the `users` table with Argon2.
#[derive(Clone)]
pub struct UserStoreVerifier {
    pool: PgPool,
    users: UserRepository,
}

impl UserStoreVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            users: UserRepository::new(),
        }
    }
}

#[async_trait]
impl CredentialVerifier for UserStoreVerifier {
    async fn verify_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> anyhow::Result<Option<VerifiedSubject>> {
        let email = normalize_email(identifier);
        let user = self
            .users
            .find_by_email(&self.pool, &email)
            .await
            .map_err(|err| anyhow::anyhow!("user lookup failed: {:?}", err))?;

        let secret = secret.to_string();
        let Some(user) = user else {
            tokio::task::spawn_blocking(move || burn_verification(&secret)).await?;
            return Ok(None);
        };

        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&secret, &hash)).await?;
        match matches {
            Ok(true) if user.is_active => Ok(Some(user.to_subject())),
            Ok(_) => Ok(None),
            Err(err) => {
                // A malformed stored hash is a rejection, not an outage.
                tracing::warn!(user_id = %user.id, error = %err, "Stored password hash is unusable");
                Ok(None)
            }
        }
    }
}
